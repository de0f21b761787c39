//! Instance Config (C14): one JSON file per edge machine that resolves a
//! hosting mode to a transport + target, read once at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingMode {
    Local,
    Jetson,
    Remote,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read instance config at {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse instance config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw on-disk shape (§4.14): `hosting_mode` plus flat `<mode>_*` fields,
/// one set of which applies depending on `hosting_mode`.
#[derive(Debug, Clone, Deserialize)]
struct RawInstanceConfig {
    hosting_mode: HostingMode,
    instance_name: String,
    #[serde(default)]
    local_host: Option<String>,
    #[serde(default)]
    local_chroma_port: Option<u16>,
    #[serde(default)]
    local_mcp_port: Option<u16>,
    #[serde(default)]
    local_tunnel_url: Option<String>,
    #[serde(default)]
    jetson_host: Option<String>,
    #[serde(default)]
    jetson_chroma_port: Option<u16>,
    #[serde(default)]
    jetson_mcp_port: Option<u16>,
    #[serde(default)]
    jetson_tunnel_url: Option<String>,
    #[serde(default)]
    remote_host: Option<String>,
    #[serde(default)]
    remote_chroma_port: Option<u16>,
    #[serde(default)]
    remote_mcp_port: Option<u16>,
    #[serde(default)]
    remote_tunnel_url: Option<String>,
}

/// Resolved view used by the rest of the edge agent: the active mode's
/// fields only, with defaults applied.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub hosting_mode: HostingMode,
    pub instance_name: String,
    pub host: String,
    pub chroma_port: u16,
    pub mcp_port: u16,
    pub tunnel_url: Option<String>,
}

impl EdgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let raw: RawInstanceConfig = serde_json::from_str(&body)?;
        Ok(Self::resolve(raw))
    }

    fn resolve(raw: RawInstanceConfig) -> Self {
        let (host, chroma_port, mcp_port, tunnel_url) = match raw.hosting_mode {
            HostingMode::Local => (raw.local_host, raw.local_chroma_port, raw.local_mcp_port, raw.local_tunnel_url),
            HostingMode::Jetson => (raw.jetson_host, raw.jetson_chroma_port, raw.jetson_mcp_port, raw.jetson_tunnel_url),
            HostingMode::Remote => (raw.remote_host, raw.remote_chroma_port, raw.remote_mcp_port, raw.remote_tunnel_url),
        };
        EdgeConfig {
            hosting_mode: raw.hosting_mode,
            instance_name: raw.instance_name,
            host: host.unwrap_or_else(|| "localhost".to_string()),
            chroma_port: chroma_port.unwrap_or(8000),
            mcp_port: mcp_port.unwrap_or(8420),
            tunnel_url,
        }
    }

    /// Tunneled transport is used whenever a tunnel URL is configured;
    /// otherwise the agent talks directly to `host:mcp_port`.
    pub fn is_tunneled(&self) -> bool {
        self.tunnel_url.is_some()
    }

    pub fn server_base_url(&self) -> String {
        match &self.tunnel_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.mcp_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_jetson_fields_and_leaves_remote_unset() {
        let raw = RawInstanceConfig {
            hosting_mode: HostingMode::Jetson,
            instance_name: "personal".to_string(),
            local_host: None,
            local_chroma_port: None,
            local_mcp_port: None,
            local_tunnel_url: None,
            jetson_host: Some("10.0.0.5".to_string()),
            jetson_chroma_port: Some(9000),
            jetson_mcp_port: Some(9420),
            jetson_tunnel_url: None,
            remote_host: Some("example.com".to_string()),
            remote_chroma_port: None,
            remote_mcp_port: None,
            remote_tunnel_url: None,
        };
        let config = EdgeConfig::resolve(raw);
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.chroma_port, 9000);
        assert_eq!(config.mcp_port, 9420);
        assert!(!config.is_tunneled());
    }

    #[test]
    fn tunnel_url_selects_tunneled_transport() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instance.json");
        std::fs::write(
            &path,
            r#"{"hosting_mode":"remote","instance_name":"personal","remote_host":"h","remote_tunnel_url":"https://tunnel.example.com/"}"#,
        )
        .unwrap();
        let config = EdgeConfig::load(&path).unwrap();
        assert!(config.is_tunneled());
        assert_eq!(config.server_base_url(), "https://tunnel.example.com");
    }
}
