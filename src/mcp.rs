//! MCP bridge over stdio.
//!
//! Adapts the [`ToolRegistry`] to the MCP JSON-RPC protocol so MCP clients
//! can launch `recall serve mcp` as a subprocess and call the tools.
//! Results are returned as text content. Logs go to stderr; stdout carries
//! only protocol frames.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use serde_json::Value;

use crate::harness::Harness;
use crate::traits::{validate_params, ToolContext, ToolRegistry};

#[derive(Clone)]
pub struct McpBridge {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(harness: Arc<Harness>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            ctx: ToolContext::new(harness),
            tools,
        }
    }

    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, Value>> = match tool.parameters_schema() {
            Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(tool.read_only())),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

/// Text sent back to the client for a tool result.
/// Schema-checked arguments for a tool call.
fn call_params(
    tool: &dyn crate::traits::Tool,
    arguments: Option<serde_json::Map<String, Value>>,
) -> Result<Value, McpError> {
    let params = arguments.map(Value::Object).unwrap_or(Value::Null);
    validate_params(&tool.parameters_schema(), params)
        .map_err(|e| McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None))
}

fn result_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "chat-recall".to_string(),
                title: Some("Chat Recall".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Index chat conversations with index_conversations, then ask questions \
                 with search_conversations. list_channels shows what can be indexed and \
                 index_status reports what has been."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = call_params(tool, request.arguments)?;

        match tool.execute(params, &self.ctx).await {
            Ok(result) => Ok(CallToolResult::success(vec![Content::text(result_text(
                &result,
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

/// Serve the built-in tools over stdin/stdout until the client disconnects.
pub async fn run_stdio(harness: Arc<Harness>) -> anyhow::Result<()> {
    let bridge = McpBridge::new(harness, Arc::new(ToolRegistry::with_builtins()));
    tracing::info!("MCP server listening on stdio");
    let service = bridge.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
