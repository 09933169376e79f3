//! In-memory vector index.
//!
//! Brute-force cosine similarity over every stored vector, behind a
//! `std::sync::RwLock`. Append-only: there is no update or delete.

use std::sync::RwLock;

use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::error::{RecallError, Result};
use crate::models::IndexedUnit;

struct Entry {
    unit: IndexedUnit,
    vector: Vec<f32>,
    /// Seed placeholder; occupies a slot but never matches a query.
    placeholder: bool,
}

/// A unit together with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: IndexedUnit,
    pub score: f32,
}

/// One semantic index instance. Never empty once built.
pub struct VectorIndex {
    generation: Uuid,
    model: String,
    entries: RwLock<Vec<Entry>>,
}

impl VectorIndex {
    /// Build an index from units and their vectors.
    ///
    /// Fails when `units` is empty or the vector count does not match.
    /// `placeholder` marks the seed units as the synthetic placeholder.
    pub(crate) fn build(
        units: Vec<IndexedUnit>,
        vectors: Vec<Vec<f32>>,
        model: &str,
        placeholder: bool,
    ) -> Result<Self> {
        if units.is_empty() {
            return Err(RecallError::IndexInit(
                "an index cannot be built from zero units".to_string(),
            ));
        }
        if units.len() != vectors.len() {
            return Err(RecallError::IndexInit(format!(
                "{} units but {} vectors",
                units.len(),
                vectors.len()
            )));
        }

        let entries = units
            .into_iter()
            .zip(vectors)
            .map(|(unit, vector)| Entry {
                unit,
                vector,
                placeholder,
            })
            .collect();

        Ok(Self {
            generation: Uuid::new_v4(),
            model: model.to_string(),
            entries: RwLock::new(entries),
        })
    }

    /// Identifies this instance; a rebuild always yields a new generation.
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    /// Name of the embedding model the vectors came from.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of occupied slots, placeholder included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of real (non-placeholder) units.
    pub fn unit_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| !e.placeholder)
            .count()
    }

    pub fn has_placeholder(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|e| e.placeholder)
    }

    pub(crate) fn append(&self, units: Vec<IndexedUnit>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if units.len() != vectors.len() {
            return Err(RecallError::IndexInsert {
                committed: 0,
                detail: format!("{} units but {} vectors", units.len(), vectors.len()),
            });
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.extend(units.into_iter().zip(vectors).map(|(unit, vector)| Entry {
            unit,
            vector,
            placeholder: false,
        }));
        Ok(())
    }

    /// The `k` most similar real units, best first. Ties keep insertion order.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<ScoredUnit> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<ScoredUnit> = entries
            .iter()
            .filter(|e| !e.placeholder)
            .map(|e| ScoredUnit {
                unit: e.unit.clone(),
                score: cosine_similarity(query_vec, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str) -> IndexedUnit {
        IndexedUnit::new(format!("content {}", id), id)
    }

    #[test]
    fn test_cannot_build_empty() {
        let err = VectorIndex::build(vec![], vec![], "m", false).err().unwrap();
        assert!(matches!(err, RecallError::IndexInit(_)));
    }

    #[test]
    fn test_build_rejects_mismatched_vectors() {
        assert!(VectorIndex::build(vec![unit("a")], vec![], "m", false).is_err());
    }

    #[test]
    fn test_search_ranks_and_truncates() {
        let idx = VectorIndex::build(
            vec![unit("a"), unit("b"), unit("c")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            "m",
            false,
        )
        .unwrap();
        let hits = idx.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unit.id, "a");
        assert_eq!(hits[1].unit.id, "c");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let idx = VectorIndex::build(
            vec![unit("first"), unit("second")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
            "m",
            false,
        )
        .unwrap();
        let hits = idx.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].unit.id, "first");
        assert_eq!(hits[1].unit.id, "second");
    }

    #[test]
    fn test_placeholder_occupies_slot_but_never_matches() {
        let idx = VectorIndex::build(vec![unit("init")], vec![vec![1.0]], "m", true).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.unit_count(), 0);
        assert!(idx.search(&[1.0], 3).is_empty());

        idx.append(vec![unit("x")], vec![vec![1.0]]).unwrap();
        let hits = idx.search(&[1.0], 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.id, "x");
        assert!(idx.has_placeholder());
    }

    #[test]
    fn test_generations_differ() {
        let a = VectorIndex::build(vec![unit("a")], vec![vec![1.0]], "m", false).unwrap();
        let b = VectorIndex::build(vec![unit("a")], vec![vec![1.0]], "m", false).unwrap();
        assert_ne!(a.generation(), b.generation());
    }
}
