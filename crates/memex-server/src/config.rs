//! Server configuration, read once at startup from environment variables
//! (§6) into a typed struct — no lazy global config reads in handlers.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_base_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub log_dir: PathBuf,
    pub api_keys_path: PathBuf,
    pub security_policy_path: Option<PathBuf>,
    pub instances: Vec<String>,
    pub chroma_host: Option<String>,
    pub chroma_port: Option<u16>,
    pub prometheus_token: String,
    pub validator_timeout: Duration,
    pub max_request_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let data_base_dir = PathBuf::from(env_or("DATA_BASE_DIR", "data"));
        let instances = env_or("INSTANCES", "default")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        ServerConfig {
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_or("SERVER_PORT", "8420").parse().unwrap_or(8420),
            pages_dir: PathBuf::from(env_or("PAGES_DIR", "pages")),
            log_dir: PathBuf::from(env_or("LOG_DIR", "logs")),
            api_keys_path: PathBuf::from(env_or("API_KEYS_PATH", "api_keys.txt")),
            security_policy_path: std::env::var("SECURITY_POLICY_PATH").ok().map(PathBuf::from),
            chroma_host: std::env::var("CHROMA_HOST").ok(),
            chroma_port: std::env::var("CHROMA_PORT").ok().and_then(|v| v.parse().ok()),
            prometheus_token: env_or("MEMEX_PROMETHEUS_TOKEN", "prometheus"),
            validator_timeout: Duration::from_secs(2),
            max_request_bytes: 1024 * 1024,
            data_base_dir,
            instances,
        }
    }

    pub fn record_dir(&self, instance: &str) -> PathBuf {
        self.data_base_dir.join(instance).join("ocr")
    }

    pub fn images_dir(&self, instance: &str) -> PathBuf {
        self.data_base_dir.join(instance).join("images")
    }

    pub fn collection_name(&self, instance: &str) -> String {
        format!("memex_{instance}")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
