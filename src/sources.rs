//! Chat sources: where messages to index come from.
//!
//! A [`ChatSource`] lists channels and fetches one page of messages per
//! channel. Adapters never fail outward: errors are logged with
//! `tracing::warn!` and surface as empty lists, so a misconfigured source
//! degrades to "nothing to index" instead of breaking the tool call.
//!
//! | `[source].provider` | Adapter |
//! |---------------------|---------|
//! | `"slack"` | [`SlackSource`](crate::connector_slack::SlackSource) |
//! | `"export"` | [`ExportSource`](crate::connector_export::ExportSource) |
//! | `"disabled"` | [`DisabledSource`] |

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::connector_export::ExportSource;
use crate::connector_slack::SlackSource;
use crate::models::{Channel, RawMessage};

#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Short provider name, e.g. `"slack"`.
    fn name(&self) -> &str;

    /// Channels visible to this source. Empty on any error.
    async fn list_channels(&self) -> Vec<Channel>;

    /// Up to `limit` recent messages from one channel. Empty on any error.
    async fn list_messages(&self, channel_id: &str, limit: usize) -> Vec<RawMessage>;
}

/// Source used when no chat platform is configured.
pub struct DisabledSource;

#[async_trait]
impl ChatSource for DisabledSource {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn list_channels(&self) -> Vec<Channel> {
        Vec::new()
    }

    async fn list_messages(&self, _channel_id: &str, _limit: usize) -> Vec<RawMessage> {
        Vec::new()
    }
}

/// Build the source named in `[source].provider`.
pub fn create_source(config: &SourceConfig) -> Result<Arc<dyn ChatSource>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledSource)),
        "slack" => Ok(Arc::new(SlackSource::from_config(config)?)),
        "export" => Ok(Arc::new(ExportSource::from_config(config)?)),
        other => bail!(
            "Unknown source provider: '{}'. Available: slack, export, disabled",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_source_is_empty() {
        let source = create_source(&SourceConfig::default()).unwrap();
        assert_eq!(source.name(), "disabled");
        assert!(source.list_channels().await.is_empty());
        assert!(source.list_messages("C1", 50).await.is_empty());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = SourceConfig {
            provider: "irc".to_string(),
            ..Default::default()
        };
        assert!(create_source(&config).is_err());
    }
}
