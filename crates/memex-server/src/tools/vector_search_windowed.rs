//! `vector-search-windowed`: one top vector hit per fixed-width time
//! window, so a long range returns a spread of relevant moments instead
//! of `k` near-duplicate hits clustered around the single best match.

use super::{relevance, resolve_range, Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use memex_core::WhereClause;
use serde_json::json;

pub struct VectorSearchWindowed;

#[async_trait]
impl Tool for VectorSearchWindowed {
    fn name(&self) -> &'static str {
        "vector-search-windowed"
    }

    fn description(&self) -> &'static str {
        "One top relevant capture per fixed-width time window across a date range."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "start": {"type": "string"},
                "end": {"type": "string"},
                "max_results": {"type": "integer", "default": 10},
                "min_relevance": {"type": "number", "default": 0.0},
            },
            "required": ["query"],
        })
    }

    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let (start, end) = resolve_range(&args)?;
        let max_results = args.get("max_results").and_then(|v| v.as_u64()).unwrap_or(10).max(1) as usize;
        let min_relevance = args.get("min_relevance").and_then(|v| v.as_f64()).unwrap_or(0.0);

        let Some(vector) = instance.vector().await else {
            return Err(ToolError::new("vector index unavailable"));
        };

        let range_hours = ((end - start).max(0.0) / 3600.0).max(0.0);
        let window_hours = (range_hours / max_results as f64).max(1.0);
        let window_seconds = window_hours * 3600.0;
        let window_count = ((end - start).max(0.0) / window_seconds).ceil() as usize;

        let mut hits = Vec::new();
        for w in 0..window_count.max(1) {
            let window_start = start + w as f64 * window_seconds;
            let window_end = (window_start + window_seconds).min(end);
            let where_clause = WhereClause::And(vec![
                WhereClause::Gte("timestamp".to_string(), window_start),
                WhereClause::Lt("timestamp".to_string(), window_end + 1.0),
            ]);
            let results = vector.query(&query, 1, Some(where_clause)).await.map_err(|e| ToolError::new(e.to_string()))?;
            if let Some(hit) = results.into_iter().next() {
                let score = relevance(hit.distance);
                if score >= min_relevance {
                    hits.push(json!({
                        "window_index": w,
                        "window_start": window_start,
                        "id": hit.id,
                        "text": hit.document,
                        "relevance": score,
                    }));
                }
            }
        }

        Ok(json!({
            "query": query,
            "start": start,
            "end": end,
            "max_results": max_results,
            "min_relevance": min_relevance,
            "window_hours": window_hours,
            "hits": hits,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_core::Record;

    #[tokio::test]
    async fn each_hit_carries_its_window_index() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        let record = Record::new("screen_0", "meeting notes about budget", None);
        instance.store().put(&record).await.unwrap();
        let vector = instance.vector().await.unwrap();
        vector.upsert(vec![record.id.clone()], vec![record.text.clone()], vec![record.vector_metadata()]).await.unwrap();

        let out = VectorSearchWindowed.call(&instance, json!({"query": "budget"})).await.unwrap();
        let hits = out["hits"].as_array().unwrap();
        assert!(!hits.is_empty());
        for hit in hits {
            assert!(hit.get("window_index").is_some());
        }
    }
}
