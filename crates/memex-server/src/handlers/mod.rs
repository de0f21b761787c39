//! HTTP handlers, one module per route group (§6).

pub mod chat;
pub mod dashboard;
pub mod mcp;
pub mod sync;

use crate::auth::{bearer_token, client_ip, Scope};
use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Shared auth + rate-limit admission check for the bearer-protected
/// per-instance routes (`sync`, `sync/status`, `mcp`). Returns the caller's
/// IP and granted scope on success, or the `ServerError` to respond with.
///
/// Every admitted request writes one `REQUEST` audit line (§4.11); denied
/// requests are already covered by the `AUTH_FAIL`/`RATE_LIMIT` lines
/// raised below, each of which carries its own `ip=` field.
pub fn admit(
    state: &AppState,
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: &str,
    path: &str,
    instance: &str,
    min_scope: Scope,
) -> Result<(String, Scope), ServerError> {
    let ip = client_ip(headers, connect_info.map(|ConnectInfo(addr)| addr));

    if !state.instances.contains_key(instance) {
        state.audit.auth_fail(&ip, instance, "unknown_instance");
        return Err(ServerError::NotFound("unknown_instance".to_string()));
    }

    let token = bearer_token(headers).ok_or_else(|| {
        state.audit.auth_fail(&ip, instance, "missing_token");
        ServerError::Unauthorized("missing_token".to_string())
    })?;

    let scope = state.auth.authenticate(token, instance, min_scope).map_err(|reason| {
        state.audit.auth_fail(&ip, instance, reason);
        ServerError::Unauthorized(reason.to_string())
    })?;

    let (allowed, retry_after, kind) = state.rate_limiter.check(&ip, instance);
    if !allowed {
        let kind_str = match kind {
            Some(crate::rate_limit::LimitKind::IpMinute) => "ip_minute",
            Some(crate::rate_limit::LimitKind::IpHour) => "ip_hour",
            Some(crate::rate_limit::LimitKind::InstanceMinute) => "instance_minute",
            None => "unknown",
        };
        state.audit.rate_limit(&ip, instance, kind_str);
        return Err(ServerError::RateLimited(retry_after));
    }

    state.audit.request(method, path, &ip, instance, 200);
    Ok((ip, scope))
}
