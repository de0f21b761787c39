//! Sync Endpoint (C8): resumable differential sync between an edge agent
//! and one instance's record store + vector index (§4.8).

use crate::auth::Scope;
use crate::error::ServerError;
use crate::handlers::admit;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use memex_core::{metadata::flatten_metadata, Record};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub instance: String,
    pub count: usize,
    pub ids: Vec<String>,
}

pub async fn sync_status(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Json<SyncStatus>, ServerError> {
    let path = format!("/{instance}/sync/status");
    admit(&state, &headers, connect_info, "GET", &path, &instance, Scope::Sync)?;
    let inst = state.instance(&instance).ok_or_else(|| ServerError::NotFound("unknown_instance".to_string()))?;
    let ids = inst.store().list_ids().await?;
    Ok(Json(SyncStatus { instance, count: ids.len(), ids }))
}

#[derive(Debug, Deserialize)]
pub struct SyncDocument {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub raw_json: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub documents: Vec<SyncDocument>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub status: &'static str,
    pub written: usize,
    pub indexed: usize,
    pub errors: Vec<String>,
}

pub async fn sync_upload(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(body): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ServerError> {
    let path = format!("/{instance}/sync");
    admit(&state, &headers, connect_info, "POST", &path, &instance, Scope::Sync)?;
    let inst = state.instance(&instance).ok_or_else(|| ServerError::NotFound("unknown_instance".to_string()))?;

    let mut written = 0usize;
    let mut errors = Vec::new();
    let mut upsert_ids = Vec::new();
    let mut upsert_texts = Vec::new();
    let mut upsert_metas = Vec::new();

    for doc in body.documents {
        let record: Record = match serde_json::from_value(doc.raw_json.clone()) {
            Ok(record) => record,
            Err(e) => {
                if errors.len() < MAX_REPORTED_ERRORS {
                    errors.push(format!("{}: {e}", doc.id));
                }
                continue;
            }
        };
        match inst.store().put(&record).await {
            Ok(()) => written += 1,
            Err(e) => {
                if errors.len() < MAX_REPORTED_ERRORS {
                    errors.push(format!("{}: {e}", doc.id));
                }
                continue;
            }
        }
        if !doc.text.is_empty() {
            let mut meta = flatten_metadata(&doc.metadata);
            for (k, v) in record.vector_metadata() {
                meta.entry(k).or_insert(v);
            }
            upsert_ids.push(doc.id);
            upsert_texts.push(doc.text);
            upsert_metas.push(meta);
        }
    }

    let indexed = upsert_ids.len();
    if indexed > 0 {
        if let Some(vector) = inst.vector().await {
            if let Err(e) = vector.upsert(upsert_ids, upsert_texts, upsert_metas).await {
                tracing::warn!("vector upsert failed during sync for {instance}: {e}");
                if errors.len() < MAX_REPORTED_ERRORS {
                    errors.push(format!("vector upsert failed: {e}"));
                }
            }
        }
    }

    state.audit.sync(&instance, written, indexed, errors.len());
    Ok(Json(SyncResponse { status: "ok", written, indexed, errors }))
}
