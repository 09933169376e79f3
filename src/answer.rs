//! Retrieval-augmented answering.
//!
//! ```text
//! query ─▶ IndexManager::query(k) ─┬─ empty ──▶ NO_CONTEXT_ANSWER
//!                                  └─ units ──▶ prompt ─▶ Generator ─▶ text
//!          any failure ───────────────────────────────────▶ ERROR_ANSWER
//! ```
//!
//! [`AnswerEngine::answer`] never returns an error; every path ends in an
//! [`Answer`] whose `text` is safe to show to the user.

use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::generation::{GenerateRequest, Generator};
use crate::index::IndexManager;

pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information found in the indexed messages to answer your query.";
pub const ERROR_ANSWER: &str = "Sorry, an error occurred while trying to answer your query.";

/// Separator placed between retrieved units in the prompt.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Generated,
    NoContext,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub outcome: AnswerOutcome,
    /// Retrieved units that went into the prompt.
    pub context_units: usize,
}

impl Answer {
    fn no_context() -> Self {
        Self {
            text: NO_CONTEXT_ANSWER.to_string(),
            outcome: AnswerOutcome::NoContext,
            context_units: 0,
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            text: ERROR_ANSWER.to_string(),
            outcome: AnswerOutcome::Failed(detail),
            context_units: 0,
        }
    }
}

/// Fill the grounded-answer template.
pub fn build_prompt(context: &[String], query: &str) -> String {
    format!(
        "You are a helpful assistant. Based on the following excerpts from chat conversations, \
         please answer the user's query.\n\
         If the provided excerpts do not contain enough information to answer the query, \
         please state that you could not find a specific answer in the provided context.\n\
         \n\
         Context from chat conversations:\n\
         ---\n\
         {}\n\
         ---\n\
         User Query: {}\n\
         \n\
         Answer:",
        context.join(CONTEXT_SEPARATOR),
        query
    )
}

pub struct AnswerEngine {
    index: Arc<IndexManager>,
    generator: Arc<dyn Generator>,
    model: String,
    top_k: usize,
    max_output_tokens: u32,
}

impl AnswerEngine {
    /// Take `top_k`, model and output bound from config.
    pub fn new(index: Arc<IndexManager>, generator: Arc<dyn Generator>, config: &Config) -> Self {
        let model = config
            .generation
            .model
            .clone()
            .unwrap_or_else(|| generator.default_model().to_string());
        Self {
            index,
            generator,
            model,
            top_k: config.retrieval.top_k,
            max_output_tokens: config.generation.max_output_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer `query` from the indexed messages.
    pub async fn answer(&self, query: &str) -> Answer {
        match self.try_answer(query).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "failed to answer query");
                Answer::failed(e.to_string())
            }
        }
    }

    async fn try_answer(&self, query: &str) -> Result<Answer> {
        let context = self.index.query(query, self.top_k).await?;
        if context.is_empty() {
            tracing::debug!("no indexed context for query");
            return Ok(Answer::no_context());
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: build_prompt(&context, query),
            max_output_tokens: self.max_output_tokens,
        };
        let generation = self.generator.generate(&request).await?;

        tracing::info!(
            context_units = context.len(),
            provider = self.generator.name(),
            model = %self.model,
            "answer generated"
        );
        Ok(Answer {
            text: generation.text,
            outcome: AnswerOutcome::Generated,
            context_units: context.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledEmbedder, Embedder, HashEmbedder};
    use crate::error::RecallError;
    use crate::generation::{DisabledGenerator, Generation};
    use crate::models::IndexedUnit;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Echoes a fixed reply and records the last request.
    struct Recording {
        reply: String,
        last: Mutex<Option<GenerateRequest>>,
    }

    impl Recording {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Generator for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        fn default_model(&self) -> &str {
            "stub-model"
        }
        async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(Generation {
                text: self.reply.clone(),
            })
        }
    }

    fn hash_index() -> Arc<IndexManager> {
        Arc::new(IndexManager::new(Arc::new(HashEmbedder::default()), 64))
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(&["a".to_string(), "b".to_string()], "what?");
        assert!(prompt.contains("---\na\n---\nb\n---\nUser Query: what?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[tokio::test]
    async fn test_no_index_gives_no_context() {
        let engine = AnswerEngine::new(hash_index(), Recording::new("x"), &Config::default());
        let answer = engine.answer("anything").await;
        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert_eq!(answer.outcome, AnswerOutcome::NoContext);
    }

    #[tokio::test]
    async fn test_placeholder_only_gives_no_context() {
        let index = hash_index();
        index.get_or_create_index(false, vec![]).await.unwrap();
        let engine = AnswerEngine::new(index, Recording::new("x"), &Config::default());
        assert_eq!(engine.answer("init").await.text, NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn test_generated_answer_uses_context() {
        let index = hash_index();
        index
            .insert(vec![
                IndexedUnit::new("the release is scheduled for friday", "m1"),
                IndexedUnit::new("lunch is pizza", "m2"),
            ])
            .await
            .unwrap();
        let generator = Recording::new("Friday.");
        let engine = AnswerEngine::new(index, generator.clone(), &Config::default());

        let answer = engine.answer("when is the release").await;
        assert_eq!(answer.text, "Friday.");
        assert_eq!(answer.outcome, AnswerOutcome::Generated);
        assert_eq!(answer.context_units, 2);

        let request = generator.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "stub-model");
        assert_eq!(request.max_output_tokens, 500);
        assert!(request.prompt.contains("the release is scheduled for friday"));
        assert!(request.prompt.contains("User Query: when is the release"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_fallback_and_idempotent() {
        let index = hash_index();
        index
            .insert(vec![IndexedUnit::new("deploy failed", "m1")])
            .await
            .unwrap();
        let engine = AnswerEngine::new(index, Arc::new(DisabledGenerator), &Config::default());

        let first = engine.answer("deploy").await;
        let second = engine.answer("deploy").await;
        assert_eq!(first.text, ERROR_ANSWER);
        assert_eq!(second.text, ERROR_ANSWER);
        assert!(matches!(first.outcome, AnswerOutcome::Failed(_)));
    }

    /// Embeds the first batch, fails every call after it.
    struct FirstBatchOnly {
        inner: HashEmbedder,
        used: AtomicBool,
    }

    #[async_trait]
    impl Embedder for FirstBatchOnly {
        fn model_name(&self) -> &str {
            "first-batch-only"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.used.swap(true, Ordering::SeqCst) {
                return Err(RecallError::Provider("quota exceeded".into()));
            }
            self.inner.embed_batch(texts).await
        }
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_fallback() {
        let index = Arc::new(IndexManager::new(
            Arc::new(FirstBatchOnly {
                inner: HashEmbedder::default(),
                used: AtomicBool::new(false),
            }),
            64,
        ));
        index
            .get_or_create_index(true, vec![IndexedUnit::new("standup moved", "m1")])
            .await
            .unwrap();

        let engine = AnswerEngine::new(index, Recording::new("x"), &Config::default());
        let answer = engine.answer("standup").await;
        assert_eq!(answer.text, ERROR_ANSWER);
        assert!(matches!(answer.outcome, AnswerOutcome::Failed(ref d) if d.contains("quota")));
    }

    #[tokio::test]
    async fn test_disabled_embedder_without_index_gives_no_context() {
        let index = Arc::new(IndexManager::new(Arc::new(DisabledEmbedder), 64));
        let engine = AnswerEngine::new(index, Recording::new("x"), &Config::default());
        assert_eq!(engine.answer("q").await.text, NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn test_top_k_from_config() {
        let index = hash_index();
        let units = (0..6)
            .map(|i| IndexedUnit::new(format!("oncall handoff {}", i), format!("m{}", i)))
            .collect();
        index.insert(units).await.unwrap();

        let mut config = Config::default();
        config.retrieval.top_k = 2;
        let engine = AnswerEngine::new(index, Recording::new("ok"), &config);
        assert_eq!(engine.answer("oncall handoff").await.context_units, 2);
    }
}
