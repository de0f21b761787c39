//! `search-recent-relevant`: an expanding-window search that trades off
//! vector relevance against recency, stopping as soon as enough hits are
//! accumulated instead of always scanning `max_days`.

use super::{relevance, Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use chrono::Utc;
use memex_core::WhereClause;
use serde_json::json;

pub struct SearchRecentRelevant;

#[async_trait]
impl Tool for SearchRecentRelevant {
    fn name(&self) -> &'static str {
        "search-recent-relevant"
    }

    fn description(&self) -> &'static str {
        "Vector search combining relevance and recency over an expanding recent window."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "initial_days": {"type": "number", "default": 7.0},
                "max_days": {"type": "number", "default": 30.0},
                "max_results": {"type": "integer", "default": 10},
                "recency_weight": {"type": "number", "default": 0.5},
                "min_score": {"type": "number", "default": 0.0},
            },
            "required": ["query"],
        })
    }

    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let initial_days = args.get("initial_days").and_then(|v| v.as_f64()).unwrap_or(7.0);
        let max_days = args.get("max_days").and_then(|v| v.as_f64()).unwrap_or(30.0);
        let max_results = args.get("max_results").and_then(|v| v.as_u64()).unwrap_or(10).max(1) as usize;
        let recency_weight = args.get("recency_weight").and_then(|v| v.as_f64()).unwrap_or(0.5);
        let min_score = args.get("min_score").and_then(|v| v.as_f64()).unwrap_or(0.0);

        let Some(vector) = instance.vector().await else {
            return Err(ToolError::new("vector index unavailable"));
        };

        let now = Utc::now().timestamp() as f64;
        let mut windows_searched = Vec::new();
        let mut current_days = initial_days.min(max_days);
        let mut scored: Vec<(f64, serde_json::Value)> = Vec::new();

        loop {
            windows_searched.push(current_days);
            let window_start = now - current_days * 86400.0;
            let where_clause = WhereClause::Gte("timestamp".to_string(), window_start);
            let hits = vector
                .query(&query, max_results * 4, Some(where_clause))
                .await
                .map_err(|e| ToolError::new(e.to_string()))?;

            scored.clear();
            for hit in &hits {
                let rel = relevance(hit.distance);
                let ts = hit.metadata.get("timestamp").and_then(|v| v.as_f64()).unwrap_or(now);
                let age_days = ((now - ts).max(0.0)) / 86400.0;
                let recency = (1.0 - age_days / max_days).max(0.0);
                let combined = rel * (1.0 - recency_weight) + recency * recency_weight;
                if combined < min_score {
                    continue;
                }
                scored.push((
                    combined,
                    json!({
                        "id": hit.id,
                        "text": hit.document,
                        "relevance": rel,
                        "recency": super::round3(recency),
                        "combined_score": super::round3(combined),
                        "timestamp": ts,
                    }),
                ));
            }
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
            // dedup by timestamp, keeping the first (highest combined score
            // since the list is already sorted descending).
            let mut deduped = Vec::new();
            let mut seen = std::collections::HashSet::new();
            for (score, item) in &scored {
                let ts_key = format!("{:.3}", item["timestamp"].as_f64().unwrap_or(0.0));
                if seen.insert(ts_key) {
                    deduped.push((*score, item.clone()));
                }
            }
            scored = deduped;

            // Stop as soon as the window turns up anything at all, or once
            // the window has reached its cap — expanding further than the
            // first window with results wastes a query for no more recall.
            if !scored.is_empty() || current_days >= max_days {
                break;
            }
            current_days = if windows_searched.len() == 1 { (current_days * 4.0).min(max_days) } else { (current_days * 2.0).min(max_days) };
        }

        scored.truncate(max_results);
        let results: Vec<_> = scored.into_iter().map(|(_, item)| item).collect();

        Ok(json!({
            "query": query,
            "initial_days": initial_days,
            "max_days": max_days,
            "max_results": max_results,
            "recency_weight": recency_weight,
            "min_score": min_score,
            "windows_searched": windows_searched,
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use memex_core::Record;

    #[tokio::test]
    async fn expands_window_until_hits_found() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        let old_dt = Utc::now() - Duration::days(12);
        let id = format!("{}_screen_0", memex_core::record::format_filename_timestamp(old_dt));
        let record = memex_core::Record { id, timestamp: old_dt.timestamp() as f64, ..memex_core::Record::new("screen_0", "quarterly roadmap review", None) };
        instance.store().put(&record).await.unwrap();
        let vector = instance.vector().await.unwrap();
        vector.upsert(vec![record.id.clone()], vec![record.text.clone()], vec![record.vector_metadata()]).await.unwrap();

        let out = SearchRecentRelevant
            .call(&instance, json!({"query": "roadmap", "initial_days": 7.0, "max_days": 30.0}))
            .await
            .unwrap();
        let windows: Vec<f64> = out["windows_searched"].as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).collect();
        assert_eq!(windows, vec![7.0, 28.0]);
        assert!(!out["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recency_weight_of_one_prefers_newest_record() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        let vector = instance.vector().await.unwrap();
        for days_ago in [1, 20] {
            let dt = Utc::now() - Duration::days(days_ago);
            let id = format!("{}_screen_0", memex_core::record::format_filename_timestamp(dt));
            let record = memex_core::Record { id, timestamp: dt.timestamp() as f64, ..memex_core::Record::new("screen_0", "status update", None) };
            instance.store().put(&record).await.unwrap();
            vector.upsert(vec![record.id.clone()], vec![record.text.clone()], vec![record.vector_metadata()]).await.unwrap();
        }
        let out = SearchRecentRelevant
            .call(&instance, json!({"query": "status", "initial_days": 30.0, "max_days": 30.0, "recency_weight": 1.0}))
            .await
            .unwrap();
        let results = out["results"].as_array().unwrap();
        assert!(results.len() >= 2);
        assert!(results[0]["timestamp"].as_f64().unwrap() > results[1]["timestamp"].as_f64().unwrap());
    }
}
