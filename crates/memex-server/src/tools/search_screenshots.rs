//! `search-screenshots`: vector search with an optional date-range
//! filter, falling back to a substring scan of the record store when the
//! vector index is unavailable or errors.

use super::{range_where, relevance, resolve_range, Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use memex_core::WhereClause;
use serde_json::json;

pub struct SearchScreenshots;

#[async_trait]
impl Tool for SearchScreenshots {
    fn name(&self) -> &'static str {
        "search-screenshots"
    }

    fn description(&self) -> &'static str {
        "Search captured screen text by relevance, optionally restricted to a date range."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "start": {"type": "string", "description": "ISO-8601 date or datetime"},
                "end": {"type": "string", "description": "ISO-8601 date or datetime"},
                "k": {"type": "integer", "default": 10},
            },
            "required": ["query"],
        })
    }

    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let k = args.get("k").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
        let has_range = args.get("start").is_some() || args.get("end").is_some();
        let (start, end) = resolve_range(&args)?;

        if let Some(vector) = instance.vector().await {
            let where_clause = if has_range {
                Some(WhereClause::And(vec![range_where(start, end), WhereClause::Eq("data_type".to_string(), memex_core::MetadataValue::String("ocr".to_string()))]))
            } else {
                Some(WhereClause::Eq("data_type".to_string(), memex_core::MetadataValue::String("ocr".to_string())))
            };
            match vector.query(&query, k, where_clause).await {
                Ok(hits) => {
                    let results: Vec<_> = hits
                        .iter()
                        .map(|hit| {
                            json!({
                                "id": hit.id,
                                "text": hit.document,
                                "relevance": relevance(hit.distance),
                                "metadata": metadata_json(&hit.metadata),
                            })
                        })
                        .collect();
                    return Ok(json!({
                        "query": query,
                        "start": start,
                        "end": end,
                        "k": k,
                        "search_method": "vector",
                        "results": results,
                    }));
                }
                Err(e) => {
                    tracing::warn!("vector query failed, falling back to substring scan: {e}");
                }
            }
        }

        let records = instance.store().iter_in_range(start, end).await.map_err(|e| ToolError::new(e.to_string()))?;
        let needle = query.to_lowercase();
        let mut hits: Vec<_> = records
            .into_iter()
            .filter_map(|record| {
                let occurrences = record.text.to_lowercase().matches(&needle).count();
                if needle.is_empty() || occurrences > 0 {
                    Some((record, occurrences))
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| b.0.timestamp.partial_cmp(&a.0.timestamp).unwrap());
        hits.truncate(k);
        let results: Vec<_> = hits
            .into_iter()
            .map(|(record, occurrences)| {
                json!({
                    "id": record.id,
                    "text": record.text,
                    "relevance": occurrences,
                    "timestamp": record.timestamp,
                })
            })
            .collect();
        Ok(json!({
            "query": query,
            "start": start,
            "end": end,
            "k": k,
            "search_method": "substring_fallback",
            "results": results,
        }))
    }
}

fn metadata_json(metadata: &std::collections::HashMap<String, memex_core::MetadataValue>) -> serde_json::Value {
    serde_json::to_value(metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<std::collections::HashMap<_, _>>())
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_core::Record;

    #[tokio::test]
    async fn vector_search_ranks_upserted_text() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        let record = Record::new("screen_0", "invoice payment due", None);
        instance.store().put(&record).await.unwrap();
        let vector = instance.vector().await.unwrap();
        vector
            .upsert(vec![record.id.clone()], vec![record.text.clone()], vec![record.vector_metadata()])
            .await
            .unwrap();

        let args = json!({"query": "invoice"});
        let out = SearchScreenshots.call(&instance, args).await.unwrap();
        assert_eq!(out["search_method"], "vector");
        assert_eq!(out["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn echoes_resolved_query_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        let out = SearchScreenshots.call(&instance, json!({"query": "receipt", "start": "2026-01-01", "end": "2026-01-02"})).await.unwrap();
        assert_eq!(out["query"], "receipt");
        assert!(out["start"].as_f64().unwrap() < out["end"].as_f64().unwrap());
    }
}
