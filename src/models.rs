//! Core data models used throughout chat-recall.
//!
//! These types represent the raw messages, indexed units, and channels that
//! flow through the ingestion and retrieval pipeline.

use serde::Serialize;
use serde_json::Value;

/// Raw message as delivered by a chat source, before validation.
///
/// Sources hand over loosely-typed payloads, so every field is optional.
/// [`RawMessage::from_value`] keeps a field only when it is a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawMessage {
    pub text: Option<String>,
    pub id: Option<String>,
    pub user: Option<String>,
    pub ts: Option<String>,
}

impl RawMessage {
    /// Convenience constructor for a well-formed message.
    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            id: Some(id.into()),
            user: None,
            ts: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }

    /// Decode an arbitrary JSON object. Non-string fields are dropped.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            text: field("text"),
            id: field("id"),
            user: field("user"),
            ts: field("ts"),
        }
    }
}

/// The atomic record stored in the semantic index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedUnit {
    pub content: String,
    pub id: String,
    pub author_id: Option<String>,
    pub timestamp: Option<String>,
}

impl IndexedUnit {
    pub fn new(content: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            id: id.into(),
            author_id: None,
            timestamp: None,
        }
    }
}

/// A channel as listed by a chat source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
}

/// Ranked unit contents returned by an index query, best match first.
pub type RetrievalResult = Vec<String>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_keeps_strings_only() {
        let raw = RawMessage::from_value(&json!({
            "text": "deploy is green",
            "id": 42,
            "user": "U123",
            "ts": null,
            "subtype": "bot_message"
        }));
        assert_eq!(raw.text.as_deref(), Some("deploy is green"));
        assert_eq!(raw.id, None);
        assert_eq!(raw.user.as_deref(), Some("U123"));
        assert_eq!(raw.ts, None);
    }

    #[test]
    fn test_from_value_non_object() {
        assert_eq!(RawMessage::from_value(&json!("hello")), RawMessage::default());
    }

    #[test]
    fn test_builder() {
        let raw = RawMessage::new("hi", "m1").with_user("u1").with_ts("t1");
        assert_eq!(raw.user.as_deref(), Some("u1"));
        assert_eq!(raw.ts.as_deref(), Some("t1"));
    }
}
