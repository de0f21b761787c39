//! `sample-time-range`: a cheap, vector-free "what was I doing at roughly
//! this time" sampler — one record per fixed window, window-first rather
//! than relevance-first.

use super::{resolve_range, sort_by_timestamp, Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use serde_json::json;

pub struct SampleTimeRange;

#[async_trait]
impl Tool for SampleTimeRange {
    fn name(&self) -> &'static str {
        "sample-time-range"
    }

    fn description(&self) -> &'static str {
        "One capture per fixed time window across a date range."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "start": {"type": "string"},
                "end": {"type": "string"},
                "max_samples": {"type": "integer", "default": 10},
                "min_window_minutes": {"type": "number", "default": 15.0},
            },
        })
    }

    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput {
        let (start, end) = resolve_range(&args)?;
        let max_samples = args.get("max_samples").and_then(|v| v.as_u64()).unwrap_or(10).max(1) as usize;
        let min_window_minutes = args.get("min_window_minutes").and_then(|v| v.as_f64()).unwrap_or(15.0);

        let total_seconds = (end - start).max(0.0);
        let window_seconds = (min_window_minutes * 60.0).max(total_seconds / max_samples as f64);
        let window_count = if window_seconds > 0.0 { (total_seconds / window_seconds).ceil() as usize } else { 1 };

        let mut records = instance.store().iter_in_range(start, end).await.map_err(|e| ToolError::new(e.to_string()))?;
        sort_by_timestamp(&mut records);

        let mut samples = Vec::new();
        for w in 0..window_count.max(1) {
            let window_start = start + w as f64 * window_seconds;
            let window_end = (window_start + window_seconds).min(end + 1.0);
            if let Some(record) = records.iter().find(|r| r.timestamp >= window_start && r.timestamp < window_end) {
                samples.push(json!({
                    "window_index": w,
                    "window_start": window_start,
                    "id": record.id,
                    "timestamp": record.timestamp,
                    "text": record.text,
                }));
            }
        }

        Ok(json!({
            "start": start,
            "end": end,
            "max_samples": max_samples,
            "min_window_minutes": min_window_minutes,
            "window_seconds": window_seconds,
            "samples": samples,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use memex_core::record::format_filename_timestamp;
    use memex_core::Record;

    #[tokio::test]
    async fn one_sample_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        for i in 0..4 {
            let dt = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i);
            let id = format!("{}_screen_0", format_filename_timestamp(dt));
            let record = Record { id, ..Record::new("screen_0", format!("hour {i}"), None) };
            instance.store().put(&record).await.unwrap();
        }
        let out = SampleTimeRange
            .call(&instance, json!({"start": "2026-01-01", "end": "2026-01-01T04:00:00", "max_samples": 4, "min_window_minutes": 60.0}))
            .await
            .unwrap();
        let samples = out["samples"].as_array().unwrap();
        assert!(samples.len() <= 4);
        assert!(!samples.is_empty());
    }
}
