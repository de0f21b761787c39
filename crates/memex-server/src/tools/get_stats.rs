//! `get-stats`: file count and storage size from the record store, plus
//! a vector count when a vector backend is available.

use super::{Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use serde_json::json;

pub struct GetStats;

#[async_trait]
impl Tool for GetStats {
    fn name(&self) -> &'static str {
        "get-stats"
    }

    fn description(&self) -> &'static str {
        "File counts, vector count, and storage size for this instance."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, instance: &Instance, _args: serde_json::Value) -> ToolOutput {
        let file_count = instance.store().count().await.map_err(|e| ToolError::new(e.to_string()))?;
        let total_bytes = instance.store().total_bytes().await.map_err(|e| ToolError::new(e.to_string()))?;
        let vector_count = match instance.vector().await {
            Some(vector) => vector.count().await.ok().map(|n| json!(n)),
            None => None,
        };
        Ok(json!({
            "file_count": file_count,
            "total_bytes": total_bytes,
            "vector_count": vector_count.unwrap_or(serde_json::Value::Null),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_core::Record;

    #[tokio::test]
    async fn reports_file_count_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        instance.store().put(&Record::new("screen_0", "hello", None)).await.unwrap();
        let out = GetStats.call(&instance, json!({})).await.unwrap();
        assert_eq!(out["file_count"], 1);
        assert!(out["total_bytes"].as_u64().unwrap() > 0);
    }
}
