//! Append-only on-disk store of OCR records: one JSON document per record,
//! filename `<id>.json`, source of truth for an instance.

use crate::error::CoreError;
use crate::record::{parse_filename_timestamp, Record};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        RecordStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, CoreError> {
        if id.is_empty() || id.contains('/') || id.contains("..") {
            return Err(CoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Write a record, atomically: write to a sibling temp file, then
    /// rename over the destination. The temp file lives in the same
    /// directory so the rename stays on one filesystem.
    pub async fn put(&self, record: &Record) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir).await?;
        let dest = self.path_for(&record.id)?;
        let tmp = self.dir.join(format!(".{}.tmp", record.id));
        let body = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &dest).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Record, CoreError> {
        let path = self.path_for(id)?;
        let body = fs::read(&path)
            .await
            .map_err(|_| CoreError::NotFound(id.to_string()))?;
        let mtime = fs::metadata(&path).await.ok().and_then(|m| m.modified().ok());
        let record: Record = serde_json::from_slice(&body)?;
        Ok(record.normalize(mtime))
    }

    pub async fn exists(&self, id: &str) -> Result<bool, CoreError> {
        let path = self.path_for(id)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Enumerate `*.json` stems. Tolerates entries disappearing or
    /// appearing mid-scan (a single directory-entry read error is skipped,
    /// not propagated).
    pub async fn list_ids(&self) -> Result<Vec<String>, CoreError> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if !stem.starts_with('.') {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Scan records whose filename-derived timestamp falls in
    /// `[start, end]`. Filenames are parsed first and document bodies are
    /// only opened for ids that are in range (or whose filename fails to
    /// parse, in which case mtime decides).
    pub async fn iter_in_range(&self, start: f64, end: f64) -> Result<Vec<Record>, CoreError> {
        let mut out = Vec::new();
        for id in self.list_ids().await? {
            let path = self.path_for(&id)?;
            let in_range = match parse_filename_timestamp(&id) {
                Some(ts) => {
                    let secs = ts.timestamp() as f64;
                    secs >= start && secs <= end
                }
                None => match fs::metadata(&path).await.ok().and_then(|m| m.modified().ok()) {
                    Some(mtime) => {
                        let secs = mtime
                            .duration_since(std::time::UNIX_EPOCH)
                            .map(|d| d.as_secs_f64())
                            .unwrap_or(0.0);
                        secs >= start && secs <= end
                    }
                    None => true,
                },
            };
            if !in_range {
                continue;
            }
            if let Ok(record) = self.get(&id).await {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.list_ids().await?.len())
    }

    /// Total on-disk size in bytes across all records, for `/health` and
    /// `get-stats`.
    pub async fn total_bytes(&self) -> Result<u64, CoreError> {
        let mut total = 0u64;
        for id in self.list_ids().await? {
            let path = self.path_for(&id)?;
            if let Ok(meta) = fs::metadata(&path).await {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let record = Record::new("screen_0", "hello", Some("test".into()));
        store.put(&record).await.unwrap();
        let fetched = store.get(&record.id).await.unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.text, "hello");
    }

    #[tokio::test]
    async fn get_missing_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn path_traversal_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let err = store.exists("../escape").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(_)));
    }

    #[tokio::test]
    async fn list_ids_reflects_puts() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        assert!(store.list_ids().await.unwrap().is_empty());
        let record = Record::new("screen_0", "x", None);
        store.put(&record).await.unwrap();
        let ids = store.list_ids().await.unwrap();
        assert_eq!(ids, vec![record.id]);
    }

    #[tokio::test]
    async fn iter_in_range_filters_by_filename_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let old = Record {
            timestamp: 100.0,
            ..Record::new("screen_0", "old", None)
        };
        let mut old = old;
        old.id = "2000-01-01T00-00-00-000000_screen_0".to_string();
        let recent = Record::new("screen_0", "recent", None);
        store.put(&old).await.unwrap();
        store.put(&recent).await.unwrap();

        let now = chrono::Utc::now().timestamp() as f64;
        let in_range = store.iter_in_range(now - 60.0, now + 60.0).await.unwrap();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, recent.id);
    }
}
