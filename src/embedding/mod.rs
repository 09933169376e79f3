//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls an OpenAI-compatible `/embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`HuggingFaceEmbedder`]**: calls the Hugging Face inference feature-extraction pipeline.
//! - **[`HashEmbedder`]**: deterministic, offline feature hashing; no network.
//! - **`LocalEmbedder`**: fastembed ONNX models (feature `local-embeddings`).
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in `[embedding]`:
//!
//! ```rust
//! # use chat_recall::config::EmbeddingConfig;
//! # use chat_recall::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```
//!
//! Remote providers make a single attempt unless `max_retries` is raised;
//! see [`crate::http`] for the retry policy.

mod hash;
#[cfg(feature = "local-embeddings")]
mod local;

pub use hash::HashEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{RecallError, Result};
use crate::http;

/// Default model for the `huggingface` provider.
pub const DEFAULT_HF_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_HF_URL: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A "text → vector" capability bound to one model for the life of the process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecallError::Provider("empty embedding response".to_string()))
    }
}

/// Check that a provider answered with one vector of the expected size per input.
fn check_shape(vectors: &[Vec<f32>], inputs: usize, dims: usize, label: &str) -> Result<()> {
    if vectors.len() != inputs {
        return Err(RecallError::Provider(format!(
            "{} returned {} embeddings for {} inputs",
            label,
            vectors.len(),
            inputs
        )));
    }
    if dims > 0 {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RecallError::Provider(format!(
                "{} returned a {}-dim embedding, expected {}",
                label,
                bad.len(),
                dims
            )));
        }
    }
    Ok(())
}

fn number_array(value: &Value, what: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| RecallError::Provider(format!("invalid response: {} is not an array", what)))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RecallError::Provider(format!("invalid response: non-numeric {}", what)))
        })
        .collect()
}

// ============ Disabled ============

/// An embedder that always fails.
///
/// Used when `embedding.provider = "disabled"`. The tools stay callable;
/// indexing reports the failure and searching answers with the error fallback.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RecallError::Provider(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI ============

/// Embedder for the OpenAI embeddings API (or any compatible gateway).
///
/// Calls `POST {url}/embeddings`. The key comes from `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    /// Create a provider from configuration, reading `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key: api_key.into(),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "model": self.model, "input": texts });
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = http::post_json(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;

        let vectors = parse_openai_response(&response)?;
        check_shape(&vectors, texts.len(), self.dims, "OpenAI")?;
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RecallError::Provider("invalid OpenAI response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| RecallError::Provider("invalid OpenAI response: missing embedding".into()))?;
        indexed.push((index, number_array(embedding, "embedding")?));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance (`POST /api/embed`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "model": self.model, "input": texts });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let response =
            http::post_json(&self.client, &url, None, &body, self.max_retries, "Ollama").await?;

        let embeddings = response
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                RecallError::Provider("invalid Ollama response: missing embeddings array".into())
            })?;
        let vectors = embeddings
            .iter()
            .map(|e| number_array(e, "embedding"))
            .collect::<Result<Vec<_>>>()?;

        check_shape(&vectors, texts.len(), self.dims, "Ollama")?;
        Ok(vectors)
    }
}

// ============ Hugging Face ============

/// Embedder using the Hugging Face inference feature-extraction pipeline.
///
/// The key comes from `HF_TOKEN`. Sentence-transformer models return one
/// pooled vector per input; models that return per-token vectors are
/// mean-pooled here.
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    url: String,
    token: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let token = match std::env::var("HF_TOKEN") {
            Ok(token) => token,
            Err(_) => bail!("HF_TOKEN environment variable not set"),
        };
        Self::with_token(config, token)
    }

    pub fn with_token(config: &EmbeddingConfig, token: impl Into<String>) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_HF_MODEL.to_string());
        let dims = config.dims.unwrap_or(match model.as_str() {
            DEFAULT_HF_MODEL => 384,
            _ => 0,
        });

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| DEFAULT_HF_URL.to_string()),
            token: token.into(),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "inputs": texts });
        let url = format!(
            "{}/{}/pipeline/feature-extraction",
            self.url.trim_end_matches('/'),
            self.model
        );
        let response = http::post_json(
            &self.client,
            &url,
            Some(&self.token),
            &body,
            self.max_retries,
            "Hugging Face",
        )
        .await?;

        let vectors = parse_feature_extraction(&response)?;
        check_shape(&vectors, texts.len(), self.dims, "Hugging Face")?;
        Ok(vectors)
    }
}

fn parse_feature_extraction(json: &Value) -> Result<Vec<Vec<f32>>> {
    let items = json.as_array().ok_or_else(|| {
        RecallError::Provider("invalid Hugging Face response: expected an array".into())
    })?;

    items
        .iter()
        .map(|item| match item.as_array().and_then(|a| a.first()) {
            Some(first) if first.is_array() => {
                let tokens = item
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|t| number_array(t, "token embedding"))
                    .collect::<Result<Vec<_>>>()?;
                Ok(mean_pool(&tokens))
            }
            _ => number_array(item, "embedding"),
        })
        .collect()
}

fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(width) = tokens.first().map(|t| t.len()) else {
        return Vec::new();
    };
    let mut pooled = vec![0.0f32; width];
    for token in tokens {
        for (acc, x) in pooled.iter_mut().zip(token) {
            *acc += x;
        }
    }
    let n = tokens.len() as f32;
    pooled.iter_mut().for_each(|x| *x /= n);
    pooled
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"huggingface"` | [`HuggingFaceEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings`) |
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "huggingface" => Ok(Arc::new(HuggingFaceEmbedder::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedder::new(
            config.dims.unwrap_or(hash::DEFAULT_DIMS),
        ))),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
