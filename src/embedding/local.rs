//! Local ONNX embeddings via fastembed.
//!
//! The model is downloaded from Hugging Face on the first embedding call and
//! cached; after that no network calls are made. Model setup and inference
//! both run on the blocking pool.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{RecallError, Result};

pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    fastembed_model: fastembed::EmbeddingModel,
    model: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let (fastembed_model, default_dims) = resolve_model(&model_name)?;

        Ok(Self {
            model_name,
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size,
            fastembed_model,
            model: Arc::new(Mutex::new(None)),
        })
    }
}

fn resolve_model(name: &str) -> anyhow::Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel::*;
    match name {
        "all-minilm-l6-v2" => Ok((AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((BGEBaseENV15, 768)),
        "nomic-embed-text-v1.5" => Ok((NomicEmbedTextV15, 768)),
        "multilingual-e5-small" => Ok((MultilingualE5Small, 384)),
        other => anyhow::bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;
        let fastembed_model = self.fastembed_model.clone();

        tokio::task::spawn_blocking(move || {
            let mut slot = model
                .lock()
                .map_err(|_| RecallError::Provider("local embedding model lock poisoned".into()))?;
            if slot.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model)
                        .with_show_download_progress(false),
                )
                .map_err(|e| {
                    RecallError::Provider(format!(
                        "failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *slot = Some(loaded);
            }
            let Some(model) = slot.as_mut() else {
                return Err(RecallError::Provider("local embedding model unavailable".into()));
            };
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RecallError::Provider(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(RecallError::provider)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "local".to_string(),
            model: Some(model.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_construction_does_not_load_model() {
        let embedder = LocalEmbedder::new(&config("bge-base-en-v1.5")).unwrap();
        assert_eq!(embedder.dims(), 768);
        assert!(embedder.model.lock().unwrap().is_none());
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(LocalEmbedder::new(&config("word2vec")).is_err());
    }
}
