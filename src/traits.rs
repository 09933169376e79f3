//! Tool trait and registry.
//!
//! Tools are the operations exposed to agents and HTTP callers. Each one
//! declares a JSON Schema for its parameters and returns a JSON value; the
//! built-in tools always return a human-readable string.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                ToolRegistry                 │
//! │  index_conversations   search_conversations │
//! │  list_channels         index_status         │
//! └──────────────┬──────────────────────────────┘
//!                ▼
//!      run_server() / McpBridge → ToolContext → Harness
//! ```
//!
//! # Usage
//!
//! ```rust
//! use chat_recall::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert!(tools.find("search_conversations").is_some());
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::harness::Harness;

/// An operation agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Built-in tools are flagged `"builtin": true` in `GET /tools/list`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// Whether the tool leaves the index untouched.
    fn read_only(&self) -> bool {
        true
    }

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool can reach while it runs.
#[derive(Clone)]
pub struct ToolContext {
    harness: Arc<Harness>,
}

impl ToolContext {
    pub fn new(harness: Arc<Harness>) -> Self {
        Self { harness }
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

pub struct IndexConversationsTool;

#[async_trait]
impl Tool for IndexConversationsTool {
    fn name(&self) -> &str {
        "index_conversations"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn description(&self) -> &str {
        "Indexes chat conversations. Specify a channel id to index one channel; \
         otherwise recent messages from every available channel are indexed."
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": { "type": "string", "description": "Channel to index" },
                "limit_per_channel": {
                    "type": "integer",
                    "description": "Messages to fetch per channel",
                    "default": 50
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let channel_id = match &params["channel_id"] {
            Value::Null => None,
            Value::String(id) => Some(id.clone()),
            other => bail!(
                "parameter 'channel_id' must be of type 'string', got {}",
                json_type_name(other)
            ),
        };
        let limit = params["limit_per_channel"]
            .as_u64()
            .map(|n| n as usize)
            .filter(|n| *n > 0);

        let outcome = ctx.harness.index_conversations(channel_id, limit).await;
        Ok(Value::String(outcome.to_string()))
    }
}

pub struct SearchConversationsTool;

#[async_trait]
impl Tool for SearchConversationsTool {
    fn name(&self) -> &str {
        "search_conversations"
    }

    fn description(&self) -> &str {
        "Searches the indexed conversations and returns an answer based on the most relevant messages."
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Question to answer" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let answer = ctx.harness.search_conversations(query).await;
        Ok(Value::String(answer.text))
    }
}

pub struct ListChannelsTool;

#[async_trait]
impl Tool for ListChannelsTool {
    fn name(&self) -> &str {
        "list_channels"
    }

    fn description(&self) -> &str {
        "Lists the channels available for indexing"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let channels = ctx.harness.list_channels().await;
        if channels.is_empty() {
            return Ok(Value::String(
                "No channels found or unable to fetch channels.".to_string(),
            ));
        }

        let lines: Vec<String> = channels
            .iter()
            .map(|c| match &c.name {
                Some(name) => format!("{} (#{})", c.id, name),
                None => c.id.clone(),
            })
            .collect();
        Ok(Value::String(format!(
            "{} channel(s):\n{}",
            channels.len(),
            lines.join("\n")
        )))
    }
}

pub struct IndexStatusTool;

#[async_trait]
impl Tool for IndexStatusTool {
    fn name(&self) -> &str {
        "index_status"
    }

    fn description(&self) -> &str {
        "Reports whether the index exists, how many messages it holds, and the embedding model"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let text = match ctx.harness.index_stats() {
            Some(stats) => format!(
                "Index {} holds {} message(s) embedded with {}.",
                stats.generation, stats.units, stats.model
            ),
            None => "The index has not been created yet.".to_string(),
        };
        Ok(Value::String(text))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the four built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IndexConversationsTool));
        registry.register(Box::new(SearchConversationsTool));
        registry.register(Box::new(ListChannelsTool));
        registry.register(Box::new(IndexStatusTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check call parameters against a tool's schema before it runs.
///
/// `params` must be an object carrying every `required` property, and each
/// declared property that is present must match its `type` and `enum`.
/// `null` is treated as `{}`. Undeclared properties pass through.
pub fn validate_params(schema: &Value, params: Value) -> Result<Value> {
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(_) => params,
        other => bail!(
            "parameters must be a JSON object, got {}",
            json_type_name(&other)
        ),
    };

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
        .unwrap_or_default();
    for name in required {
        if params.get(name).is_none() {
            bail!("missing required parameter: {}", name);
        }
    }

    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Ok(params);
    };
    for (name, prop) in properties {
        let Some(value) = params.get(name) else {
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    name,
                    expected,
                    json_type_name(value)
                );
            }
        }

        if let Some(allowed) = prop.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(params)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
