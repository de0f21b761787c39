//! `time-range-summary`: an evenly distributed, deterministic sample of
//! records in a range.

use super::{evenly_sample, resolve_range, sort_by_timestamp, Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use serde_json::json;

pub struct TimeRangeSummary;

#[async_trait]
impl Tool for TimeRangeSummary {
    fn name(&self) -> &'static str {
        "time-range-summary"
    }

    fn description(&self) -> &'static str {
        "An evenly distributed sample of captures across a date range."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "start": {"type": "string"},
                "end": {"type": "string"},
                "max_results": {"type": "integer", "default": 20},
            },
        })
    }

    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput {
        let (start, end) = resolve_range(&args)?;
        let max_results = args.get("max_results").and_then(|v| v.as_u64()).unwrap_or(20) as usize;

        let mut records = instance.store().iter_in_range(start, end).await.map_err(|e| ToolError::new(e.to_string()))?;
        sort_by_timestamp(&mut records);
        let total = records.len();
        let sample = evenly_sample(&records, max_results);
        let items: Vec<_> = sample
            .iter()
            .map(|r| json!({"id": r.id, "timestamp": r.timestamp, "timestamp_iso": r.timestamp_iso, "text": r.text}))
            .collect();

        Ok(json!({
            "start": start,
            "end": end,
            "max_results": max_results,
            "total_records": total,
            "sampled": items.len(),
            "items": items,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_core::record::format_filename_timestamp;
    use memex_core::Record;
    use chrono::{TimeZone, Utc};

    async fn seed(instance: &Instance, n: i64) {
        for i in 0..n {
            let dt = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(i);
            let id = format!("{}_screen_0", format_filename_timestamp(dt));
            let record = Record { id, ..Record::new("screen_0", format!("text {i}"), None) };
            instance.store().put(&record).await.unwrap();
        }
    }

    #[tokio::test]
    async fn samples_evenly_with_consecutive_gaps_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        seed(&instance, 100).await;
        let out = TimeRangeSummary
            .call(&instance, json!({"start": "2026-01-01", "end": "2026-01-02", "max_results": 10}))
            .await
            .unwrap();
        assert_eq!(out["sampled"], 10);
        assert_eq!(out["total_records"], 100);
    }

    #[tokio::test]
    async fn returns_all_records_when_under_max() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        seed(&instance, 3).await;
        let out = TimeRangeSummary.call(&instance, json!({"start": "2026-01-01", "end": "2026-01-02", "max_results": 20})).await.unwrap();
        assert_eq!(out["sampled"], 3);
    }
}
