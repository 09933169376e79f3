//! Offline source over a directory of exported channel files.
//!
//! Each `<channel>.json` directly under `root` is a JSON array of message
//! objects in the Slack export shape (`text`, `user`, `ts`, optional
//! `client_msg_id` or `id`). The file stem is the channel id.
//!
//! ```toml
//! [source]
//! provider = "export"
//! root = "./exports/acme"
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::models::{Channel, RawMessage};
use crate::sources::ChatSource;

pub struct ExportSource {
    root: PathBuf,
}

impl ExportSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        match &config.root {
            Some(root) => Ok(Self::new(root)),
            None => bail!("source.root must be set when provider is 'export'"),
        }
    }

    pub fn scan_channels(&self) -> Result<Vec<Channel>> {
        if !self.root.is_dir() {
            bail!("Export root does not exist: {}", self.root.display());
        }

        let mut channels = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                channels.push(Channel {
                    id: stem.to_string(),
                    name: Some(stem.to_string()),
                });
            }
        }

        channels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(channels)
    }

    /// The last `limit` messages of the channel file, oldest first.
    pub fn read_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<RawMessage>> {
        if channel_id.contains(['/', '\\']) || channel_id.starts_with('.') {
            bail!("Invalid channel id: {}", channel_id);
        }
        let path = self.root.join(format!("{}.json", channel_id));
        let values = read_array(&path)?;

        let skip = values.len().saturating_sub(limit);
        Ok(values
            .iter()
            .skip(skip)
            .map(|v| to_raw_message(channel_id, v))
            .collect())
    }
}

fn read_array(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => bail!("{} is not a JSON array", path.display()),
    }
}

fn to_raw_message(channel_id: &str, value: &Value) -> RawMessage {
    let mut raw = RawMessage::from_value(value);
    if raw.id.is_none() {
        raw.id = value
            .get("client_msg_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| raw.ts.as_ref().map(|ts| format!("{}:{}", channel_id, ts)));
    }
    raw
}

#[async_trait]
impl ChatSource for ExportSource {
    fn name(&self) -> &str {
        "export"
    }

    async fn list_channels(&self) -> Vec<Channel> {
        match self.scan_channels() {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "failed to list exported channels");
                Vec::new()
            }
        }
    }

    async fn list_messages(&self, channel_id: &str, limit: usize) -> Vec<RawMessage> {
        match self.read_messages(channel_id, limit) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(channel = channel_id, error = %e, "failed to read exported messages");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn export_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("general.json"),
            json!([
                { "text": "first", "user": "U1", "ts": "1.0", "client_msg_id": "m-1" },
                { "text": "second", "user": "U2", "ts": "2.0" },
                { "text": "third", "id": "explicit", "ts": "3.0" }
            ])
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("random.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_channels_from_file_stems() {
        let dir = export_dir();
        let source = ExportSource::new(dir.path());
        let ids: Vec<String> = source.list_channels().await.into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["general", "random"]);
    }

    #[tokio::test]
    async fn test_messages_keep_last_limit() {
        let dir = export_dir();
        let source = ExportSource::new(dir.path());
        let messages = source.list_messages("general", 2).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id.as_deref(), Some("general:2.0"));
        assert_eq!(messages[1].id.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn test_client_msg_id_used() {
        let dir = export_dir();
        let messages = ExportSource::new(dir.path()).list_messages("general", 10).await;
        assert_eq!(messages[0].id.as_deref(), Some("m-1"));
    }

    #[tokio::test]
    async fn test_missing_channel_and_root_are_empty() {
        let dir = export_dir();
        assert!(ExportSource::new(dir.path()).list_messages("nope", 10).await.is_empty());
        assert!(ExportSource::new(dir.path()).list_messages("../general", 10).await.is_empty());
        assert!(ExportSource::new("/definitely/not/here").list_channels().await.is_empty());
    }

    #[test]
    fn test_from_config_requires_root() {
        assert!(ExportSource::from_config(&SourceConfig::default()).is_err());
    }
}
