//! JSON-RPC Endpoint (C9): `POST /<instance>/mcp`. One JSON-RPC 2.0
//! request per call; `initialize` / `tools/list` / `tools/call` / `ping`,
//! notifications (no `id`) answered with a bare 202 (§4.9).

use crate::auth::Scope;
use crate::error::ServerError;
use crate::handlers::admit;
use crate::state::AppState;
use crate::tools::{registry, ToolError};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Instant;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "memex-server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const APPLICATION_ERROR: i64 = -32000;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

fn ok_response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn err_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": RpcError { code, message: message.into() }})
}

pub async fn mcp_handler(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: axum::body::Bytes,
) -> Response {
    let path = format!("/{instance}/mcp");
    if let Err(e) = admit(&state, &headers, connect_info, "POST", &path, &instance, Scope::Read) {
        return e.into_response();
    }

    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return (StatusCode::OK, Json(err_response(Value::Null, PARSE_ERROR, e.to_string()))).into_response();
        }
    };
    let is_notification = request.id.is_none();
    let id = request.id.clone().unwrap_or(Value::Null);

    if request.jsonrpc != "2.0" && !request.jsonrpc.is_empty() {
        return respond(is_notification, err_response(id, INVALID_REQUEST, "jsonrpc must be \"2.0\""));
    }

    let result = match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
            "capabilities": {"tools": {}},
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({
            "tools": registry().iter().map(|t| json!({
                "name": t.name(),
                "description": t.description(),
                "inputSchema": t.input_schema(),
            })).collect::<Vec<_>>(),
        })),
        "tools/call" => handle_tools_call(&state, &instance, request.params).await,
        _ => Err((METHOD_NOT_FOUND, format!("unknown method: {}", request.method))),
    };

    let is_initialize = request.method == "initialize" && result.is_ok();
    let body = match result {
        Ok(value) => ok_response(id, value),
        Err((code, message)) => err_response(id, code, message),
    };
    let response = respond(is_notification, body);
    if is_initialize {
        with_session_header(response)
    } else {
        response
    }
}

fn respond(is_notification: bool, body: Value) -> Response {
    if is_notification {
        return StatusCode::ACCEPTED.into_response();
    }
    (StatusCode::OK, Json(body)).into_response()
}

async fn handle_tools_call(state: &AppState, instance: &str, params: Value) -> Result<Value, (i64, String)> {
    let name = params.get("name").and_then(|v| v.as_str()).ok_or((INVALID_PARAMS, "params.name is required".to_string()))?;
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    let inst = state.instance(instance).ok_or((INVALID_REQUEST, "unknown_instance".to_string()))?;
    let tools = registry();
    let Some(tool) = tools.iter().find(|t| t.name() == name) else {
        return Err((METHOD_NOT_FOUND, format!("unknown tool: {name}")));
    };

    let (allow, reason) = state.validator.validate(name, &arguments, instance).await;
    if !allow {
        state.audit.ai_deny(instance, name, &reason);
        return Ok(tool_result(true, json!({"error": "policy_denied", "reason": reason})));
    }

    let started = Instant::now();
    let output = tool.call(&inst, arguments.clone()).await;
    let duration_ms = started.elapsed().as_millis() as u64;
    let query_len = arguments.get("query").and_then(|v| v.as_str()).map(|s| s.len()).unwrap_or(0);

    match output {
        Ok(value) => {
            let results = value.get("results").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
            state.audit.tool_ok(instance, name, query_len, results, duration_ms);
            Ok(tool_result(false, value))
        }
        Err(ToolError { message }) => Ok(tool_result(true, json!({"error": message}))),
    }
}

fn tool_result(is_error: bool, payload: Value) -> Value {
    json!({
        "content": [{"type": "text", "text": payload.to_string()}],
        "isError": is_error,
    })
}

/// Generates and attaches a fresh `MCP-Session-Id` header to an
/// `initialize` response, per §4.9. Split out of `mcp_handler` so the
/// session id is only minted once per connection's `initialize` call.
pub fn with_session_header(mut response: Response) -> Response {
    let session_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert("MCP-Session-Id", value);
    }
    response
}
