//! `daily-summary`: captures for one calendar day bucketed into six fixed
//! times-of-day, evenly sampled per period.

use super::{evenly_sample, sort_by_timestamp, Tool, ToolError, ToolOutput};
use crate::instance::Instance;
use async_trait::async_trait;
use chrono::{TimeZone, Timelike, Utc};
use memex_core::record::parse_flexible_timestamp;
use memex_core::Record;
use serde_json::json;

const MAX_PER_PERIOD: usize = 5;
const TEXT_TRUNCATE: usize = 500;

struct Period {
    key: &'static str,
    start_hour: u32,
    end_hour: u32,
}

const PERIODS: &[Period] = &[
    Period { key: "early_morning", start_hour: 5, end_hour: 8 },
    Period { key: "morning", start_hour: 8, end_hour: 12 },
    Period { key: "afternoon", start_hour: 12, end_hour: 17 },
    Period { key: "evening", start_hour: 17, end_hour: 21 },
    Period { key: "night", start_hour: 21, end_hour: 24 },
    Period { key: "late_night", start_hour: 0, end_hour: 5 },
];

pub struct DailySummary;

#[async_trait]
impl Tool for DailySummary {
    fn name(&self) -> &'static str {
        "daily-summary"
    }

    fn description(&self) -> &'static str {
        "Sampled captures for one calendar day, grouped into time-of-day periods."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "YYYY-MM-DD"},
                "include_text": {"type": "boolean", "default": false},
            },
            "required": ["date"],
        })
    }

    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput {
        let date_str = args.get("date").and_then(|v| v.as_str()).ok_or_else(|| ToolError::new("date is required"))?;
        let include_text = args.get("include_text").and_then(|v| v.as_bool()).unwrap_or(false);
        let start = parse_flexible_timestamp(date_str, false).ok_or_else(|| ToolError::new(format!("invalid date: {date_str}")))?;
        let end = parse_flexible_timestamp(date_str, true).ok_or_else(|| ToolError::new(format!("invalid date: {date_str}")))?;

        let mut records = instance
            .store()
            .iter_in_range(start.timestamp() as f64, end.timestamp() as f64)
            .await
            .map_err(|e| ToolError::new(e.to_string()))?;
        sort_by_timestamp(&mut records);

        let mut periods_json = Vec::new();
        for period in PERIODS {
            let in_period: Vec<&Record> = records
                .iter()
                .filter(|r| hour_in_period(Utc.timestamp_opt(r.timestamp as i64, 0).single().unwrap_or_else(Utc::now).hour(), period))
                .collect();
            if in_period.is_empty() {
                continue;
            }
            let sampled = evenly_sample(&in_period, MAX_PER_PERIOD);
            let captures: Vec<_> = sampled
                .iter()
                .map(|r| {
                    let mut item = json!({
                        "id": r.id,
                        "timestamp": r.timestamp,
                        "timestamp_iso": r.timestamp_iso,
                    });
                    if include_text {
                        item["text"] = json!(truncate(&r.text, TEXT_TRUNCATE));
                    }
                    item
                })
                .collect();
            periods_json.push(json!({
                "period": period.key,
                "total": in_period.len(),
                "sampled": captures.len(),
                "captures": captures,
            }));
        }

        Ok(json!({
            "date": date_str,
            "include_text": include_text,
            "total_records": records.len(),
            "periods": periods_json,
        }))
    }
}

fn hour_in_period(hour: u32, period: &Period) -> bool {
    if period.start_hour <= period.end_hour {
        hour >= period.start_hour && hour < period.end_hour
    } else {
        hour >= period.start_hour || hour < period.end_hour
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memex_core::record::format_filename_timestamp;

    async fn put_at(instance: &Instance, hour: u32, text: &str) {
        let dt = Utc.with_ymd_and_hms(2026, 2, 10, hour, 0, 0).unwrap();
        let id = format!("{}_screen_0", format_filename_timestamp(dt));
        let record = Record { id, timestamp: dt.timestamp() as f64, ..Record::new("screen_0", text, None) };
        instance.store().put(&record).await.unwrap();
    }

    #[tokio::test]
    async fn buckets_into_fixed_periods() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        put_at(&instance, 6, "breakfast").await;
        put_at(&instance, 14, "lunch meeting").await;
        let out = DailySummary.call(&instance, json!({"date": "2026-02-10"})).await.unwrap();
        let periods: Vec<String> = out["periods"].as_array().unwrap().iter().map(|p| p["period"].as_str().unwrap().to_string()).collect();
        assert!(periods.contains(&"early_morning".to_string()));
        assert!(periods.contains(&"afternoon".to_string()));
    }

    #[tokio::test]
    async fn truncates_text_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let instance = Instance::new("t", dir.path().join("ocr"), dir.path().join("pages"));
        put_at(&instance, 9, &"x".repeat(600)).await;
        let out = DailySummary.call(&instance, json!({"date": "2026-02-10", "include_text": true})).await.unwrap();
        let capture = &out["periods"][0]["captures"][0];
        assert_eq!(capture["text"].as_str().unwrap().len(), 503);
    }
}
