//! Dashboard & metrics surface (§4.11 supplement): read-only,
//! unauthenticated routes derived entirely from C1 file metadata plus
//! C11's two log files — no separate metrics store.

use crate::audit::{read_audit_summary, read_usage_events};
use crate::error::ServerError;
use crate::pages::page_path;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut instances = serde_json::Map::new();
    for (name, inst) in &state.instances {
        let ocr_files = inst.store().count().await.unwrap_or(0);
        instances.insert(
            name.clone(),
            json!({"ocr_files": ocr_files, "data_dir": state.config.record_dir(name).display().to_string()}),
        );
    }
    Json(json!({
        "status": "ok",
        "service": "memex-server",
        "version": env!("CARGO_PKG_VERSION"),
        "instances": instances,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn api_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "memex-server",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": "2024-11-05",
        "instances": state.instances.keys().collect::<Vec<_>>(),
    }))
}

pub async fn api_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut per_instance = serde_json::Map::new();
    for (name, inst) in &state.instances {
        let file_count = inst.store().count().await.unwrap_or(0);
        let total_bytes = inst.store().total_bytes().await.unwrap_or(0);
        per_instance.insert(name.clone(), json!({"file_count": file_count, "total_bytes": total_bytes}));
    }

    let source_ips = read_audit_summary(state.audit.audit_path());
    let usage = read_usage_events(state.audit.usage_path());

    let mut mcp_calls = 0u64;
    let mut mcp_calls_by_tool: HashMap<String, u64> = HashMap::new();
    let mut daily_trends: HashMap<String, u64> = HashMap::new();
    for event in &usage {
        mcp_calls += 1;
        *mcp_calls_by_tool.entry(event.tool.clone()).or_insert(0) += 1;
        if let Some(dt) = chrono::DateTime::from_timestamp(event.ts, 0) {
            *daily_trends.entry(dt.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
        }
    }

    Json(json!({
        "instances": per_instance,
        "source_ips": source_ips,
        "mcp_calls": mcp_calls,
        "mcp_calls_by_tool": mcp_calls_by_tool,
        "daily_trends": daily_trends,
    }))
}

pub async fn instance_detail(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<serde_json::Value>, ServerError> {
    let inst = state.instance(&name).ok_or_else(|| ServerError::NotFound("unknown_instance".to_string()))?;
    let file_count = inst.store().count().await?;
    let total_bytes = inst.store().total_bytes().await?;
    let all = inst.store().iter_in_range(0.0, f64::MAX).await?;
    let oldest = all.iter().map(|r| r.timestamp).fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))));
    let newest = all.iter().map(|r| r.timestamp).fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));

    let usage = read_usage_events(state.audit.usage_path());
    let cutoff = Utc::now() - Duration::days(30);
    let mut daily_calls: HashMap<String, u64> = HashMap::new();
    let mut calls_by_tool: HashMap<String, u64> = HashMap::new();
    let mut durations = Vec::new();
    for event in usage.iter().filter(|e| e.instance == name) {
        if let Some(dt) = chrono::DateTime::from_timestamp(event.ts, 0) {
            if dt >= cutoff {
                *daily_calls.entry(dt.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
            }
        }
        *calls_by_tool.entry(event.tool.clone()).or_insert(0) += 1;
        durations.push(event.duration_ms);
    }
    durations.sort_unstable();
    let avg_latency_ms = if durations.is_empty() { 0.0 } else { durations.iter().sum::<u64>() as f64 / durations.len() as f64 };
    let p95_latency_ms = percentile(&durations, 0.95);

    Ok(Json(json!({
        "instance": name,
        "file_count": file_count,
        "total_bytes": total_bytes,
        "oldest_timestamp": oldest,
        "newest_timestamp": newest,
        "daily_calls": daily_calls,
        "calls_by_tool": calls_by_tool,
        "avg_latency_ms": avg_latency_ms,
        "p95_latency_ms": p95_latency_ms,
    })))
}

fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

pub async fn api_pages(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut pages = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&state.config.pages_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let metadata = entry.metadata().await.ok();
            pages.push(json!({
                "slug": slug,
                "url": format!("/pages/{slug}"),
                "size": metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                "created": metadata.and_then(|m| m.created().ok()).map(|t| chrono::DateTime::<Utc>::from(t).to_rfc3339()),
            }));
        }
    }
    Json(json!({"pages": pages}))
}

pub async fn get_page(State(state): State<AppState>, Path(slug): Path<String>) -> Result<impl IntoResponse, ServerError> {
    let path = page_path(&state.config.pages_dir, &slug).map_err(|_| ServerError::BadRequest("invalid slug".to_string()))?;
    let body = tokio::fs::read_to_string(&path).await.map_err(|_| ServerError::NotFound("page not found".to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body))
}

pub async fn get_screenshot(
    State(state): State<AppState>,
    Path((instance, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        return Err(ServerError::BadRequest("invalid filename".to_string()));
    }
    if !state.instances.contains_key(&instance) {
        return Err(ServerError::NotFound("unknown_instance".to_string()));
    }
    let path = state.config.images_dir(&instance).join(&filename);
    let body = tokio::fs::read(&path).await.map_err(|_| ServerError::NotFound("screenshot not found".to_string()))?;
    let content_type = if filename.ends_with(".png") { "image/png" } else { "image/jpeg" };
    Ok(([(header::CONTENT_TYPE, content_type)], body))
}
