//! Auth (C5): bearer token lookup and per-instance authorization.
//!
//! Token file format: `TOKEN=instance1,instance2:scope` lines, one per
//! token; `#`-prefixed comments and blank lines are ignored; scope is one
//! of `read`/`sync`/`admin`, defaulting to `read` when omitted. The
//! reserved prometheus token is granted `sync` scope to every configured
//! instance regardless of what the token file says, mirroring the
//! original's dedicated sync-token carve-out.

use axum::http::HeaderMap;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    Read,
    Sync,
    Admin,
}

impl Scope {
    fn parse(s: &str) -> Scope {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Scope::Sync,
            "admin" => Scope::Admin,
            _ => Scope::Read,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenEntry {
    instances: HashSet<String>,
    scope: Scope,
}

#[derive(Debug, Clone)]
pub struct AuthStore {
    tokens: HashMap<String, TokenEntry>,
    prometheus_token: String,
    instances: Vec<String>,
}

impl AuthStore {
    /// Load a token file. Missing file yields an empty store (every
    /// request is then unauthorized except the prometheus sync token).
    pub fn load(path: &std::path::Path, prometheus_token: String, instances: Vec<String>) -> Self {
        let mut tokens = HashMap::new();
        if let Ok(body) = std::fs::read_to_string(path) {
            for line in body.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((token, rest)) = line.split_once('=') else {
                    continue;
                };
                let (instances_part, scope) = match rest.rsplit_once(':') {
                    Some((inst, scope)) => (inst, Scope::parse(scope)),
                    None => (rest, Scope::Read),
                };
                let instances: HashSet<String> = instances_part
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                tokens.insert(token.trim().to_string(), TokenEntry { instances, scope });
            }
        } else {
            tracing::warn!("no token file at {}; only the reserved sync token will authenticate", path.display());
        }
        AuthStore { tokens, prometheus_token, instances }
    }

    /// `(ok, reason)` per §4.5. `min_scope` is the lowest scope the caller
    /// accepts for this route (e.g. `Sync` for the sync endpoints).
    pub fn authenticate(&self, token: &str, instance: &str, min_scope: Scope) -> Result<Scope, &'static str> {
        if token == self.prometheus_token {
            if self.instances.iter().any(|i| i == instance) {
                return Ok(Scope::Sync);
            }
            return Err("unknown_instance");
        }
        let Some(entry) = self.tokens.get(token) else {
            return Err("invalid_token");
        };
        if !entry.instances.contains(instance) {
            return Err("instance_not_allowed");
        }
        if entry.scope < min_scope {
            return Err("insufficient_scope");
        }
        Ok(entry.scope)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Client IP precedence per §6: `CF-Connecting-IP` → `X-Forwarded-For` →
/// socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = headers.get("CF-Connecting-IP").and_then(|h| h.to_str().ok()) {
        return ip.trim().to_string();
    }
    if let Some(xff) = headers.get("X-Forwarded-For").and_then(|h| h.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.map(|a| a.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tokens(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_instance_list_and_scope() {
        let f = write_tokens("abc123=personal,work:sync\n# comment\n\nxyz=personal\n");
        let store = AuthStore::load(f.path(), "prometheus-secret".into(), vec!["personal".into(), "work".into()]);
        assert_eq!(store.authenticate("abc123", "work", Scope::Sync).unwrap(), Scope::Sync);
        assert_eq!(store.authenticate("xyz", "personal", Scope::Read).unwrap(), Scope::Read);
        assert!(store.authenticate("xyz", "personal", Scope::Sync).is_err());
        assert!(store.authenticate("xyz", "unknown", Scope::Read).is_err());
    }

    #[test]
    fn prometheus_token_gets_sync_to_every_instance_regardless_of_file() {
        let f = write_tokens("");
        let store = AuthStore::load(f.path(), "prom-secret".into(), vec!["personal".into()]);
        assert_eq!(store.authenticate("prom-secret", "personal", Scope::Sync).unwrap(), Scope::Sync);
        assert!(store.authenticate("prom-secret", "other", Scope::Sync).is_err());
    }

    #[test]
    fn unknown_token_is_rejected() {
        let f = write_tokens("abc=personal\n");
        let store = AuthStore::load(f.path(), "prom".into(), vec!["personal".into()]);
        assert_eq!(store.authenticate("nope", "personal", Scope::Read).unwrap_err(), "invalid_token");
    }
}
