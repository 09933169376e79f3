//! Slack Web API source.
//!
//! Uses `conversations.list` for channels and `conversations.history` for
//! messages, one page each. The bot token is read from the environment
//! variable named by `[source].token_env` when the source is built.
//!
//! ```toml
//! [source]
//! provider = "slack"
//! token_env = "SLACK_BOT_TOKEN"
//! # base_url = "https://slack.com/api"
//! ```
//!
//! Slack reports API failures as HTTP 200 with `"ok": false`; those are
//! treated the same as transport errors.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{Channel, RawMessage};
use crate::sources::ChatSource;

const DEFAULT_SLACK_URL: &str = "https://slack.com/api";
const CHANNEL_PAGE_SIZE: usize = 200;

pub struct SlackSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    token_env: String,
}

impl SlackSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!(
                token_env = %config.token_env,
                "Slack token not set; the slack source will return nothing"
            );
        }
        Self::build(
            config.base_url.as_deref().unwrap_or(DEFAULT_SLACK_URL),
            token,
            &config.token_env,
            config.timeout_secs,
        )
    }

    /// Build with an explicit token (or none).
    pub fn with_token(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        Self::build(base_url, token, "SLACK_BOT_TOKEN", timeout_secs)
    }

    fn build(
        base_url: &str,
        token: Option<String>,
        token_env: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build Slack HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            token_env: token_env.to_string(),
        })
    }

    async fn call(&self, method: &str, query: &[(&str, String)]) -> Result<Value> {
        let Some(token) = self.token.as_deref() else {
            bail!("Slack token not available; set {}", self.token_env);
        };

        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Slack {} request failed", method))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Slack {} returned HTTP {}", method, status);
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Slack {} returned invalid JSON", method))?;

        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let reason = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown_error");
            bail!("Slack {} failed: {}", method, reason);
        }

        Ok(body)
    }

    /// Public, non-archived channels (first page only).
    pub async fn fetch_channels(&self) -> Result<Vec<Channel>> {
        let body = self
            .call(
                "conversations.list",
                &[
                    ("types", "public_channel".to_string()),
                    ("exclude_archived", "true".to_string()),
                    ("limit", CHANNEL_PAGE_SIZE.to_string()),
                ],
            )
            .await?;

        let channels = body
            .get("channels")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|c| {
                        let id = c.get("id")?.as_str()?;
                        Some(Channel {
                            id: id.to_string(),
                            name: c.get("name").and_then(|n| n.as_str()).map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(channels)
    }

    /// Most recent `limit` messages of one channel (first page only).
    pub async fn fetch_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<RawMessage>> {
        let body = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let messages = body
            .get("messages")
            .and_then(|v| v.as_array())
            .map(|list| list.iter().map(|m| to_raw_message(channel_id, m)).collect())
            .unwrap_or_default();

        Ok(messages)
    }
}

/// Slack messages carry no `id`; use `client_msg_id`, else `"{channel}:{ts}"`.
fn to_raw_message(channel_id: &str, value: &Value) -> RawMessage {
    let mut raw = RawMessage::from_value(value);
    raw.id = value
        .get("client_msg_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| raw.ts.as_ref().map(|ts| format!("{}:{}", channel_id, ts)));
    raw
}

#[async_trait]
impl ChatSource for SlackSource {
    fn name(&self) -> &str {
        "slack"
    }

    async fn list_channels(&self) -> Vec<Channel> {
        match self.fetch_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list Slack channels");
                Vec::new()
            }
        }
    }

    async fn list_messages(&self, channel_id: &str, limit: usize) -> Vec<RawMessage> {
        match self.fetch_messages(channel_id, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(channel = channel_id, error = %e, "failed to fetch Slack messages");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> SlackSource {
        SlackSource::with_token(&server.uri(), Some("xoxb-test".to_string()), 5).unwrap()
    }

    #[tokio::test]
    async fn test_lists_channels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.list"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channels": [
                    { "id": "C1", "name": "general" },
                    { "id": "C2" },
                    { "name": "no-id" }
                ]
            })))
            .mount(&server)
            .await;

        let channels = source(&server).list_channels().await;
        assert_eq!(
            channels,
            vec![
                Channel { id: "C1".into(), name: Some("general".into()) },
                Channel { id: "C2".into(), name: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_message_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(query_param("channel", "C1"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    { "text": "ship it on friday", "user": "U1", "ts": "1700000000.000100", "client_msg_id": "abc-123" },
                    { "text": "bot says hi", "ts": "1700000001.000200", "subtype": "bot_message" }
                ]
            })))
            .mount(&server)
            .await;

        let messages = source(&server).list_messages("C1", 2).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id.as_deref(), Some("abc-123"));
        assert_eq!(messages[0].user.as_deref(), Some("U1"));
        assert_eq!(messages[1].id.as_deref(), Some("C1:1700000001.000200"));
    }

    #[tokio::test]
    async fn test_api_error_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "invalid_auth" })),
            )
            .mount(&server)
            .await;

        let s = source(&server);
        assert!(s.list_channels().await.is_empty());
        let err = s.fetch_channels().await.unwrap_err();
        assert!(err.to_string().contains("invalid_auth"));
    }

    #[tokio::test]
    async fn test_missing_token_returns_nothing() {
        let server = MockServer::start().await;
        let s = SlackSource::with_token(&server.uri(), None, 5).unwrap();
        assert!(s.list_channels().await.is_empty());
        assert!(s.list_messages("C1", 10).await.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
