//! MCP JSON-RPC protocol handler.
//!
//! Parses JSON-RPC messages, routes tool calls through the connection manager
//! to the appropriate handler, and produces JSON-RPC responses. Implements the
//! MCP methods `initialize`, `initialized`, `ping`, `tools/list` and
//! `tools/call`. The framing (stdio lines or HTTP bodies) lives in
//! `transport.rs` and `http.rs`.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::handlers::{self, McpToolResult};
use super::tools::{DispatchError, ToolCall, ToolRegistry};
use super::transport::Transport;
use crate::joplin::ConnectionManager;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "joplin-mcp";

// ---------------------------------------------------------------------------
// JSON-RPC message types
// ---------------------------------------------------------------------------

/// Incoming JSON-RPC request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Outgoing JSON-RPC response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    fn tool_result(id: Value, result: &McpToolResult) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, -32603, format!("Failed to serialize tool result: {}", e)),
        }
    }
}

// ---------------------------------------------------------------------------
// MCP Server
// ---------------------------------------------------------------------------

pub struct McpServer {
    registry: ToolRegistry,
    manager: Arc<ConnectionManager>,
}

impl McpServer {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            registry: ToolRegistry::new(),
            manager,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Handle one raw JSON-RPC message. `None` means nothing goes back
    /// (notifications, or requests without an id).
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!("[MCP] Unparseable message: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    -32700, // Parse error
                    format!("Invalid JSON: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return request
                .id
                .map(|id| JsonRpcResponse::error(id, -32600, "Invalid JSON-RPC version"));
        }

        let response = self.handle_request(&request).await;

        // Notifications (no id) don't get a response
        request.id.as_ref()?;
        response
    }

    async fn handle_request(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Some(handle_initialize(id)),
            "initialized" | "notifications/initialized" => {
                info!("[MCP] Client sent 'initialized' notification");
                None
            }
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(self.handle_tools_list(id)),
            "tools/call" => Some(self.handle_tools_call(id, &request.params).await),
            "notifications/cancelled" => {
                info!("[MCP] Request cancelled: {:?}", request.params);
                None
            }
            _ => Some(JsonRpcResponse::error(
                id,
                -32601, // Method not found
                format!("Unknown method: {}", request.method),
            )),
        }
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools: Vec<Value> = self
            .registry
            .list_tools()
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let tool_name = params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        if tool_name.is_empty() {
            return JsonRpcResponse::error(id, -32602, "Missing tool name in params");
        }

        let call = match self.registry.parse_call(&tool_name, &args) {
            Ok(call) => call,
            Err(e) => {
                match &e {
                    DispatchError::UnknownTool(_) => warn!("[MCP] {}", e),
                    DispatchError::InvalidArguments { .. } => info!("[MCP] {}", e),
                }
                return JsonRpcResponse::tool_result(id, &McpToolResult::error(e.to_string()));
            }
        };

        let started = Instant::now();
        let result = self.route_tool_call(&call).await;
        debug!(
            tool = call.name(),
            is_error = result.is_error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[MCP] Tool call finished"
        );

        JsonRpcResponse::tool_result(id, &result)
    }

    /// Route a decoded call to its handler. Everything except `connect` runs
    /// against a freshly verified connection.
    async fn route_tool_call(&self, call: &ToolCall) -> McpToolResult {
        info!(tool = call.name(), "[MCP] Tool call");

        if let ToolCall::Connect(args) = call {
            return handlers::connection::handle_connect(&self.manager, args).await;
        }

        let client = match self.manager.ensure_connected().await {
            Ok(client) => client,
            Err(e) => {
                warn!(tool = call.name(), "[MCP] {}", e);
                return McpToolResult::error(e.to_string());
            }
        };

        match call {
            // ---- Notebooks ----
            ToolCall::ListNotebooks => handlers::notebooks::handle_list_notebooks(&client).await,
            ToolCall::ReadNotebook(args) => handlers::notebooks::handle_read_notebook(&client, args).await,
            ToolCall::CreateFolder(args) => handlers::notebooks::handle_create_folder(&client, args).await,
            ToolCall::EditFolder(args) => handlers::notebooks::handle_edit_folder(&client, args).await,
            ToolCall::DeleteFolder(args) => handlers::notebooks::handle_delete_folder(&client, args).await,

            // ---- Notes ----
            ToolCall::SearchNotes(args) => handlers::notes::handle_search_notes(&client, args).await,
            ToolCall::ReadNote(args) => handlers::notes::handle_read_note(&client, args).await,
            ToolCall::ReadMultiNote(args) => handlers::notes::handle_read_multinote(&client, args).await,
            ToolCall::CreateNote(args) => handlers::notes::handle_create_note(&client, args).await,
            ToolCall::EditNote(args) => handlers::notes::handle_edit_note(&client, args).await,
            ToolCall::DeleteNote(args) => handlers::notes::handle_delete_note(&client, args).await,

            ToolCall::Connect(args) => handlers::connection::handle_connect(&self.manager, args).await,
        }
    }

    /// Serve line-delimited JSON-RPC until the transport reaches EOF.
    pub async fn run<T: Transport>(&self, transport: &mut T) -> std::io::Result<()> {
        info!("Joplin MCP server running");

        while let Some(message) = transport.read_message().await? {
            let Some(response) = self.handle_message(&message).await else {
                continue;
            };
            match serde_json::to_string(&response) {
                Ok(json) => transport.write_message(&json).await?,
                Err(e) => error!("[MCP] Failed to serialize response: {}", e),
            }
        }

        info!("MCP transport closed, shutting down");
        Ok(())
    }
}

/// Handle `initialize` -- return server capabilities.
fn handle_initialize(id: Value) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}
