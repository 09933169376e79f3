//! Text generation providers.
//!
//! A [`Generator`] turns one prompt into one completion. Calls are made
//! once with no retry; the configured HTTP timeout is the only bound.
//!
//! | `[generation].provider` | Provider | Default model |
//! |-------------------------|----------|---------------|
//! | `"openai"` | [`OpenAIGenerator`] (`/chat/completions`) | `gpt-4o` |
//! | `"ollama"` | [`OllamaGenerator`] (`/api/generate`) | none, `model` required |
//! | `"disabled"` | [`DisabledGenerator`] | n/a |

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::{RecallError, Result};
use crate::http;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name, e.g. `"openai"`.
    fn name(&self) -> &str;

    /// Model used when `[generation].model` is not set.
    fn default_model(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation>;
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    fn default_model(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<Generation> {
        Err(RecallError::Provider(
            "Generation provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI ============

/// OpenAI chat completions (or a compatible gateway). Key from `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &GenerationConfig,
        api_key: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        DEFAULT_OPENAI_MODEL
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        let body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": request.max_output_tokens,
        });
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response =
            http::post_json(&self.client, &url, Some(&self.api_key), &body, 0, "OpenAI").await?;

        let text = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RecallError::Provider("invalid OpenAI response: missing message content".into())
            })?;

        Ok(Generation {
            text: text.to_string(),
        })
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        ""
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        let body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "num_predict": request.max_output_tokens },
        });
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = http::post_json(&self.client, &url, None, &body, 0, "Ollama").await?;

        let text = response
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| RecallError::Provider("invalid Ollama response: missing response".into()))?;

        Ok(Generation {
            text: text.to_string(),
        })
    }
}

/// Build the generator named in `[generation].provider`.
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
