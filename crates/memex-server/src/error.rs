//! HTTP-facing error type for the memex server.
//!
//! Only errors that must reach a client as a bare HTTP status implement
//! this; tool-call failures never surface here (§7) — they are caught at
//! the dispatch boundary and converted into a `ToolResult::Error` instead.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payload too large")]
    TooLarge,
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<memex_core::CoreError> for ServerError {
    fn from(e: memex_core::CoreError) -> Self {
        ServerError::Internal(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg})),
            ServerError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, json!({"error": reason})),
            ServerError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, json!({"error": "rate_limited"})),
            ServerError::NotFound(what) => (StatusCode::NOT_FOUND, json!({"error": what})),
            ServerError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, json!({"error": "payload_too_large"})),
            ServerError::Upstream(msg) => (StatusCode::BAD_GATEWAY, json!({"error": msg})),
            ServerError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "internal_error"}))
            }
        };
        let mut response = (status, Json(body)).into_response();
        if let ServerError::RateLimited(retry_after) = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
