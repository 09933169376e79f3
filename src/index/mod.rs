//! Vector index lifecycle management.
//!
//! [`IndexManager`] owns the single live [`VectorIndex`] shared by the
//! ingestion pipeline and the answer engine. It creates the index lazily,
//! can force a clean rebuild, and appends units as they are ingested.
//!
//! # Concurrency
//!
//! Mutations (`get_or_create_index`, `insert`) are serialized behind one
//! async mutex held for the whole call, embedding included, so a rebuild
//! never races an in-flight insert. Queries only snapshot the current
//! `Arc<VectorIndex>` and search it without taking the mutex.
//!
//! # Seeding
//!
//! A [`VectorIndex`] cannot be built from zero units. When asked to build
//! from an empty seed, the manager inserts a placeholder unit
//! (id [`PLACEHOLDER_ID`], content [`PLACEHOLDER_CONTENT`]). The
//! placeholder takes a slot but is excluded from every query result.

pub mod memory;

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{RecallError, Result};
use crate::models::{IndexedUnit, RetrievalResult};

pub use memory::{ScoredUnit, VectorIndex};

/// Reserved id of the seed placeholder unit.
pub const PLACEHOLDER_ID: &str = "init";
/// Content of the seed placeholder unit.
pub const PLACEHOLDER_CONTENT: &str = "init";

/// Snapshot of the live index for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub generation: Uuid,
    /// Real units, placeholder excluded.
    pub units: usize,
    pub has_placeholder: bool,
    pub model: String,
}

pub struct IndexManager {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    live: RwLock<Option<Arc<VectorIndex>>>,
    writer: Mutex<()>,
}

impl IndexManager {
    /// Create a manager with no live index. `batch_size` bounds how many
    /// texts go to the embedder per request.
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
            live: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// The live index, if one has been created.
    pub fn current(&self) -> Option<Arc<VectorIndex>> {
        self.live.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stats(&self) -> Option<IndexStats> {
        self.current().map(|index| IndexStats {
            generation: index.generation(),
            units: index.unit_count(),
            has_placeholder: index.has_placeholder(),
            model: index.model().to_string(),
        })
    }

    /// Return the live index, or build one from `seed_units`.
    ///
    /// With `force_new == false` and a live index, this is a no-op that
    /// returns the existing instance. Otherwise a new index is built (from
    /// the placeholder if `seed_units` is empty) and replaces the live one.
    /// On [`RecallError::IndexInit`] the previous live index stays in place.
    pub async fn get_or_create_index(
        &self,
        force_new: bool,
        seed_units: Vec<IndexedUnit>,
    ) -> Result<Arc<VectorIndex>> {
        let _guard = self.writer.lock().await;
        self.get_or_create_locked(force_new, seed_units).await
    }

    /// Discard the live index and build a fresh one from `seed_units`.
    pub async fn reset(&self, seed_units: Vec<IndexedUnit>) -> Result<Arc<VectorIndex>> {
        self.get_or_create_index(true, seed_units).await
    }

    async fn get_or_create_locked(
        &self,
        force_new: bool,
        seed_units: Vec<IndexedUnit>,
    ) -> Result<Arc<VectorIndex>> {
        if !force_new {
            if let Some(index) = self.current() {
                return Ok(index);
            }
        }

        let placeholder = seed_units.is_empty();
        let units = if placeholder {
            vec![IndexedUnit::new(PLACEHOLDER_CONTENT, PLACEHOLDER_ID)]
        } else {
            seed_units
        };

        let mut vectors = Vec::with_capacity(units.len());
        for batch in units.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.content.clone()).collect();
            let embedded = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| RecallError::IndexInit(e.to_string()))?;
            vectors.extend(embedded);
        }

        let index = Arc::new(VectorIndex::build(
            units,
            vectors,
            self.embedder.model_name(),
            placeholder,
        )?);

        *self.live.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&index));

        tracing::info!(
            generation = %index.generation(),
            seed_units = index.unit_count(),
            placeholder,
            forced = force_new,
            "vector index initialized"
        );
        Ok(index)
    }

    /// Append units to the live index, creating it first if needed.
    /// Returns the number of units appended.
    ///
    /// Embedding happens in batches and each batch is appended as soon as it
    /// is embedded, so a failure part way through leaves the earlier batches
    /// indexed; the error carries how many landed.
    pub async fn insert(&self, units: Vec<IndexedUnit>) -> Result<usize> {
        if units.is_empty() {
            return Ok(0);
        }

        let _guard = self.writer.lock().await;
        let index = self
            .get_or_create_locked(false, Vec::new())
            .await
            .map_err(|e| RecallError::IndexInsert {
                committed: 0,
                detail: e.to_string(),
            })?;

        let mut inserted = 0usize;
        for batch in units.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.content.clone()).collect();
            let appended = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) => index.append(batch.to_vec(), vectors).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(detail) = appended {
                return Err(RecallError::IndexInsert {
                    committed: inserted,
                    detail: format!("{} (after {} of {} units)", detail, inserted, units.len()),
                });
            }
            inserted += batch.len();
        }

        tracing::info!(
            generation = %index.generation(),
            inserted,
            total = index.unit_count(),
            "units inserted"
        );
        Ok(inserted)
    }

    /// Scored nearest-neighbor search.
    ///
    /// Fails with [`RecallError::IndexNotInitialized`] when no index exists.
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredUnit>> {
        let index = self.current().ok_or(RecallError::IndexNotInitialized)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(text).await?;
        Ok(index.search(&query_vec, k))
    }

    /// Contents of the `k` units most similar to `text`, best first.
    ///
    /// A missing index yields an empty result rather than an error.
    pub async fn query(&self, text: &str, k: usize) -> Result<RetrievalResult> {
        match self.search(text, k).await {
            Ok(hits) => Ok(hits.into_iter().map(|h| h.unit.content).collect()),
            Err(RecallError::IndexNotInitialized) => {
                tracing::debug!("query before index initialization; returning no results");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
