//! Edge Sync Client (C13): differential upload to the central server, with
//! resumption on oversized batches and exponential backoff on transient
//! failures.

use memex_core::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_BATCH_SIZE: usize = 100;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("record store error: {0}")]
    Store(#[from] memex_core::CoreError),
}

#[derive(Debug, Deserialize)]
struct SyncStatus {
    #[allow(dead_code)]
    instance: String,
    #[allow(dead_code)]
    count: usize,
    ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SyncDocument {
    id: String,
    text: String,
    metadata: serde_json::Value,
    raw_json: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    documents: &'a [SyncDocument],
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    #[allow(dead_code)]
    status: String,
    written: usize,
    errors: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub errors: usize,
}

pub struct SyncClient {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    token: String,
    batch_size: usize,
    dry_run: bool,
}

impl SyncClient {
    pub fn new(base_url: impl Into<String>, instance: impl Into<String>, token: impl Into<String>, dry_run: bool) -> Self {
        SyncClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            instance: instance.into(),
            token: token.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Tunneled transport (§4.13): GET status, local-diff by stem, POST in
    /// batches.
    pub async fn run(&self, store: &RecordStore) -> Result<SyncReport, SyncError> {
        let status = self.fetch_status().await?;
        let remote_ids: HashSet<String> = status.ids.into_iter().collect();

        let local_ids = store.list_ids().await?;
        let mut to_sync = Vec::new();
        for id in local_ids {
            if remote_ids.contains(&id) {
                continue;
            }
            let record = match store.get(&id).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("skipping unreadable record {id}: {e}");
                    continue;
                }
            };
            let raw_json = serde_json::to_value(&record).unwrap_or(serde_json::Value::Null);
            let metadata = serde_json::to_value(record.vector_metadata()).unwrap_or(serde_json::Value::Null);
            to_sync.push(SyncDocument { id: record.id, text: record.text, metadata, raw_json });
        }

        if self.dry_run {
            tracing::info!("dry run: would sync {} document(s)", to_sync.len());
            return Ok(SyncReport { synced: to_sync.len(), errors: 0 });
        }

        let mut report = SyncReport::default();
        for chunk in to_sync.chunks(self.batch_size) {
            self.post_batch(chunk, 0, &mut report).await;
        }
        Ok(report)
    }

    async fn fetch_status(&self) -> Result<SyncStatus, SyncError> {
        let url = format!("{}/{}/sync/status", self.base_url, self.instance);
        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Posts one batch, splitting in half on 413 and retrying each half
    /// recursively (bottoming out at a single-document POST, which on 413
    /// is counted as an error); any other failure backs off
    /// exponentially (`2^attempt` seconds) up to [`MAX_ATTEMPTS`] attempts.
    fn post_batch<'a>(
        &'a self,
        documents: &'a [SyncDocument],
        attempt: u32,
        report: &'a mut SyncReport,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if documents.is_empty() {
                return;
            }

            let url = format!("{}/{}/sync", self.base_url, self.instance);
            let body = SyncRequest { documents };
            let response = match self.client.post(&url).bearer_auth(&self.token).json(&body).send().await {
                Ok(response) => response,
                Err(_) if attempt < MAX_ATTEMPTS => {
                    self.backoff(attempt).await;
                    return self.post_batch(documents, attempt + 1, report).await;
                }
                Err(_) => {
                    report.errors += documents.len();
                    return;
                }
            };

            if response.status() == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
                if documents.len() == 1 {
                    report.errors += 1;
                    return;
                }
                let mid = documents.len() / 2;
                self.post_batch(&documents[..mid], 0, report).await;
                self.post_batch(&documents[mid..], 0, report).await;
                return;
            }

            if !response.status().is_success() {
                if attempt < MAX_ATTEMPTS {
                    self.backoff(attempt).await;
                    return self.post_batch(documents, attempt + 1, report).await;
                }
                report.errors += documents.len();
                return;
            }

            match response.json::<SyncResponse>().await {
                Ok(parsed) => {
                    report.synced += parsed.written;
                    report.errors += parsed.errors.len();
                }
                Err(_) => report.errors += documents.len(),
            }
        })
    }

    async fn backoff(&self, attempt: u32) {
        tokio::time::sleep(Duration::from_secs(2u64.saturating_pow(attempt))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_batch_size_matches_spec() {
        let client = SyncClient::new("http://localhost:8420", "personal", "tok", false);
        assert_eq!(client.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn with_batch_size_floors_at_one() {
        let client = SyncClient::new("http://localhost:8420", "personal", "tok", false).with_batch_size(0);
        assert_eq!(client.batch_size, 1);
    }
}
