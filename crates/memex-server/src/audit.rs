//! Audit / Usage Log (C11): every request writes one `key=value` audit
//! line; every successful tool call additionally appends one JSON object
//! to the usage log. These two files are the sole input to the dashboard
//! metrics endpoints (§4.11) — no database for metrics.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const MAX_PARSED_LINES: usize = 5000;

pub struct AuditLog {
    audit_file: Mutex<std::fs::File>,
    usage_file: Mutex<std::fs::File>,
    audit_path: PathBuf,
    usage_path: PathBuf,
}

impl AuditLog {
    pub fn open(log_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let audit_path = log_dir.join("audit.log");
        let usage_path = log_dir.join("usage.jsonl");
        let audit_file = OpenOptions::new().create(true).append(true).open(&audit_path)?;
        let usage_file = OpenOptions::new().create(true).append(true).open(&usage_path)?;
        Ok(AuditLog {
            audit_file: Mutex::new(audit_file),
            usage_file: Mutex::new(usage_file),
            audit_path,
            usage_path,
        })
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }

    pub fn usage_path(&self) -> &Path {
        &self.usage_path
    }

    fn write_audit_line(&self, prefix: &str, fields: &[(&str, &str)]) {
        let mut line = format!("{prefix} ts={}", Utc::now().to_rfc3339());
        for (k, v) in fields {
            line.push(' ');
            line.push_str(k);
            line.push('=');
            line.push_str(v);
        }
        line.push('\n');
        if let Ok(mut file) = self.audit_file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }

    pub fn request(&self, method: &str, path: &str, ip: &str, instance: &str, status: u16) {
        self.write_audit_line(
            "REQUEST",
            &[("method", method), ("path", path), ("ip", ip), ("instance", instance), ("status", &status.to_string())],
        );
    }

    pub fn auth_fail(&self, ip: &str, instance: &str, reason: &str) {
        self.write_audit_line("AUTH_FAIL", &[("ip", ip), ("instance", instance), ("reason", reason)]);
    }

    pub fn rate_limit(&self, ip: &str, instance: &str, kind: &str) {
        self.write_audit_line("RATE_LIMIT", &[("ip", ip), ("instance", instance), ("kind", kind)]);
    }

    pub fn sync(&self, instance: &str, written: usize, indexed: usize, errors: usize) {
        self.write_audit_line(
            "SYNC",
            &[
                ("instance", instance),
                ("written", &written.to_string()),
                ("indexed", &indexed.to_string()),
                ("errors", &errors.to_string()),
            ],
        );
    }

    pub fn ai_deny(&self, instance: &str, tool: &str, reason: &str) {
        self.write_audit_line("AI_DENY", &[("instance", instance), ("tool", tool), ("reason", reason)]);
    }

    pub fn chat(&self, instance: &str, session_id: &str) {
        self.write_audit_line("CHAT", &[("instance", instance), ("session", session_id)]);
    }

    pub fn tool_ok(&self, instance: &str, tool: &str, query_len: usize, results: usize, duration_ms: u64) {
        self.write_audit_line(
            "TOOL_OK",
            &[("instance", instance), ("tool", tool), ("duration_ms", &duration_ms.to_string())],
        );
        let event = UsageEvent {
            ts: Utc::now().timestamp(),
            event: "tool_call".to_string(),
            instance: instance.to_string(),
            tool: tool.to_string(),
            query_len,
            results,
            duration_ms,
        };
        if let Ok(line) = serde_json::to_string(&event) {
            if let Ok(mut file) = self.usage_file.lock() {
                let _ = writeln!(file, "{line}");
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub ts: i64,
    pub event: String,
    pub instance: String,
    pub tool: String,
    pub query_len: usize,
    pub results: usize,
    pub duration_ms: u64,
}

/// Parse up to the last `MAX_PARSED_LINES` lines of the usage log.
pub fn read_usage_events(path: &Path) -> Vec<UsageEvent> {
    let Ok(body) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let lines: Vec<&str> = body.lines().collect();
    let start = lines.len().saturating_sub(MAX_PARSED_LINES);
    lines[start..].iter().filter_map(|line| serde_json::from_str(line).ok()).collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IpSummary {
    pub request_count: u64,
    pub last_seen: Option<String>,
    pub instances: Vec<String>,
}

/// Parse up to the last `MAX_PARSED_LINES` lines of the audit log into a
/// per-source-IP summary, used by `/api/metrics`.
pub fn read_audit_summary(path: &Path) -> HashMap<String, IpSummary> {
    let mut summary: HashMap<String, IpSummary> = HashMap::new();
    let Ok(body) = std::fs::read_to_string(path) else {
        return summary;
    };
    let lines: Vec<&str> = body.lines().collect();
    let start = lines.len().saturating_sub(MAX_PARSED_LINES);
    for line in &lines[start..] {
        let fields = parse_kv_line(line);
        let Some(ip) = fields.get("ip") else { continue };
        let entry = summary.entry(ip.clone()).or_default();
        entry.request_count += 1;
        if let Some(ts) = fields.get("ts") {
            entry.last_seen = Some(ts.clone());
        }
        if let Some(instance) = fields.get("instance") {
            if !entry.instances.contains(instance) {
                entry.instances.push(instance.clone());
            }
        }
    }
    summary
}

fn parse_kv_line(line: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut parts = line.split_whitespace();
    parts.next(); // prefix
    for part in parts {
        if let Some((k, v)) = part.split_once('=') {
            out.insert(k.to_string(), v.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_ok_appends_usage_line_readable_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        log.tool_ok("personal", "search-screenshots", 12, 3, 42);
        let events = read_usage_events(log.usage_path());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tool, "search-screenshots");
        assert_eq!(events[0].results, 3);
    }

    #[test]
    fn audit_summary_counts_requests_per_ip() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        log.request("POST", "/personal/mcp", "1.2.3.4", "personal", 200);
        log.request("POST", "/personal/mcp", "1.2.3.4", "personal", 200);
        log.auth_fail("5.6.7.8", "work", "invalid_token");
        let summary = read_audit_summary(log.audit_path());
        assert_eq!(summary.get("1.2.3.4").unwrap().request_count, 2);
        assert_eq!(summary.get("5.6.7.8").unwrap().request_count, 1);
    }
}
