//! MCP transport endpoints.
//!
//! A deliberately small JSON-RPC surface: the gateway's job is the auth
//! perimeter, not MCP session bookkeeping. `POST /mcp` requires a
//! validated identity (the strict middleware guarantees one is attached);
//! `GET /mcp` serves a keep-alive event stream and may be anonymous.

use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::auth::UserIdentity;
use crate::server::AppState;
use crate::tools::McpTool;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into() }),
            id,
        }
    }
}

/// Tool info for tools/list responses.
#[derive(Debug, Serialize)]
struct McpToolInfo {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: serde_json::Value,
}

/// Handle `POST /mcp`. The strict auth middleware has already attached
/// a validated [`UserIdentity`].
pub async fn handle_mcp_post(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<UserIdentity>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    tracing::debug!(method = %request.method, oid = %identity.oid, "Handling MCP request");

    let is_notification = request.id.is_none();

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(request.id, handle_initialize(&request.params)),
        "notifications/initialized" | "initialized" | "notifications/cancelled" => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            JsonRpcResponse::success(request.id, serde_json::json!({}))
        }
        "tools/list" => handle_tools_list(request.id, &state.tools),
        "tools/call" => handle_tools_call(request.id, &request.params, &state, &identity).await,
        "ping" => JsonRpcResponse::success(request.id, serde_json::json!({})),
        _ => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            JsonRpcResponse::error(request.id, -32601, format!("Method not found: {}", request.method))
        }
    };

    Json(response).into_response()
}

/// Handle `GET /mcp`: keep-alive SSE channel for server-initiated
/// messages. Permissive auth; an identity is attached when a valid
/// token was presented.
pub async fn handle_mcp_get(
    identity: Option<Extension<UserIdentity>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    match identity {
        Some(Extension(ref identity)) => {
            tracing::info!(oid = %identity.oid, "New MCP event stream");
        }
        None => tracing::info!("New anonymous MCP event stream"),
    }

    Sse::new(stream::empty()).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(15)).text("ping"),
    )
}

fn handle_initialize(params: &serde_json::Value) -> serde_json::Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("2024-11-05");

    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": "mcp-auth-gateway",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_tools_list(id: Option<serde_json::Value>, tools: &[Box<dyn McpTool>]) -> JsonRpcResponse {
    let tool_list: Vec<McpToolInfo> = tools
        .iter()
        .map(|t| McpToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect();

    JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_list }))
}

async fn handle_tools_call(
    id: Option<serde_json::Value>,
    params: &serde_json::Value,
    state: &AppState,
    identity: &UserIdentity,
) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(id, -32602, "Missing 'name' parameter");
    };

    let arguments = params.get("arguments").cloned().unwrap_or(serde_json::json!({}));

    let Some(tool) = state.tools.iter().find(|t| t.name() == tool_name) else {
        return JsonRpcResponse::error(id, -32602, format!("Tool not found: {tool_name}"));
    };

    tracing::info!(tool = %tool_name, oid = %identity.oid, "Executing tool");

    match tool.execute(&state.tool_ctx, identity, arguments).await {
        Ok(result) => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": result
                }]
            }),
        ),
        Err(e) => {
            tracing::error!(tool = %tool_name, error = %e, "Tool execution failed");
            JsonRpcResponse::error(id, -32000, format!("Tool error: {e}"))
        }
    }
}
