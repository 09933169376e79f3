//! Composition root shared by the CLI, HTTP server, and MCP bridge.
//!
//! A [`Harness`] owns one [`IndexManager`] and hands the same instance to
//! the ingestion pipeline and the answer engine, so indexing and answering
//! always observe the same live index.

use anyhow::Result;
use std::sync::Arc;

use crate::answer::{Answer, AnswerEngine, AnswerOutcome, ERROR_ANSWER};
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::generation::{create_generator, Generator};
use crate::index::{IndexManager, IndexStats};
use crate::ingest::{index_conversations, IndexOutcome, IndexRequest};
use crate::models::Channel;
use crate::sources::{create_source, ChatSource};

pub const EMPTY_QUERY_ANSWER: &str = "Please provide a non-empty query.";

pub struct Harness {
    config: Arc<Config>,
    index: Arc<IndexManager>,
    engine: AnswerEngine,
    source: Arc<dyn ChatSource>,
}

impl Harness {
    /// Build every provider named in the config.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let source = create_source(&config.source)?;
        Ok(Self::new(config, embedder, generator, source))
    }

    /// Build from explicit providers.
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        source: Arc<dyn ChatSource>,
    ) -> Self {
        let index = Arc::new(IndexManager::new(embedder, config.embedding.batch_size));
        let engine = AnswerEngine::new(Arc::clone(&index), generator, &config);
        tracing::debug!(
            embedding = index.embedder().model_name(),
            model = engine.model(),
            source = source.name(),
            "harness ready"
        );
        Self {
            config: Arc::new(config),
            index,
            engine,
            source,
        }
    }

    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }

    pub fn source(&self) -> &Arc<dyn ChatSource> {
        &self.source
    }

    /// Index one channel, or every channel the source lists.
    /// `limit` defaults to `[source].default_limit`.
    pub async fn index_conversations(
        &self,
        channel_id: Option<String>,
        limit: Option<usize>,
    ) -> IndexOutcome {
        let request = IndexRequest {
            channel_id,
            limit_per_channel: limit.unwrap_or(self.config.source.default_limit),
            min_text_chars: self.config.source.min_text_chars,
        };
        index_conversations(&self.index, self.source.as_ref(), &request).await
    }

    /// Answer a question, creating the index first if needed.
    pub async fn search_conversations(&self, query: &str) -> Answer {
        if query.trim().is_empty() {
            return Answer {
                text: EMPTY_QUERY_ANSWER.to_string(),
                outcome: AnswerOutcome::NoContext,
                context_units: 0,
            };
        }

        if let Err(e) = self.index.get_or_create_index(false, Vec::new()).await {
            tracing::error!(error = %e, "index initialization failed before search");
            return Answer {
                text: ERROR_ANSWER.to_string(),
                outcome: AnswerOutcome::Failed(e.to_string()),
                context_units: 0,
            };
        }

        self.engine.answer(query).await
    }

    pub async fn list_channels(&self) -> Vec<Channel> {
        self.source.list_channels().await
    }

    pub fn index_stats(&self) -> Option<IndexStats> {
        self.index.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::NO_CONTEXT_ANSWER;
    use crate::embedding::{DisabledEmbedder, HashEmbedder};
    use crate::generation::DisabledGenerator;
    use crate::sources::DisabledSource;

    fn harness(embedder: Arc<dyn Embedder>) -> Harness {
        Harness::new(
            Config::default(),
            embedder,
            Arc::new(DisabledGenerator),
            Arc::new(DisabledSource),
        )
    }

    #[test]
    fn test_from_default_config() {
        let h = Harness::from_config(Config::default()).unwrap();
        assert_eq!(h.source().name(), "disabled");
        assert!(h.index_stats().is_none());
    }

    #[tokio::test]
    async fn test_empty_query() {
        let h = harness(Arc::new(HashEmbedder::default()));
        assert_eq!(h.search_conversations("   ").await.text, EMPTY_QUERY_ANSWER);
        assert!(h.index_stats().is_none());
    }

    #[tokio::test]
    async fn test_search_creates_index() {
        let h = harness(Arc::new(HashEmbedder::default()));
        assert_eq!(h.search_conversations("anything").await.text, NO_CONTEXT_ANSWER);
        let stats = h.index_stats().unwrap();
        assert_eq!(stats.units, 0);
        assert!(stats.has_placeholder);
    }

    #[tokio::test]
    async fn test_search_with_broken_embedder() {
        let h = harness(Arc::new(DisabledEmbedder));
        assert_eq!(h.search_conversations("anything").await.text, ERROR_ANSWER);
    }
}
