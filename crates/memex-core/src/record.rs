//! The record type captured on the edge and persisted by the record store.

use crate::metadata::{flatten_metadata, MetadataValue};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Filename grammar a record id is expected to follow:
/// `YYYY-MM-DDTHH-MM-SS-uuuuuu_<screen>`. Parsing is tolerant: microseconds
/// may be absent, and a caller with a file mtime in hand can fall back to it
/// when the filename itself doesn't parse.
const TIMESTAMP_LEN_WITH_MICROS: usize = 26;
const TIMESTAMP_LEN_NO_MICROS: usize = 19;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// Seconds since epoch, for range queries.
    pub timestamp: f64,
    /// ISO-8601 rendering of `timestamp`, for display.
    pub timestamp_iso: String,
    #[serde(default = "default_screen_name")]
    pub screen_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub text_length: usize,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub screenshot_path: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_screen_name() -> String {
    "unknown".to_string()
}

fn default_data_type() -> String {
    "ocr".to_string()
}

impl Record {
    pub fn new(screen_name: impl Into<String>, text: impl Into<String>, source: Option<String>) -> Self {
        let screen_name = screen_name.into();
        let text = text.into();
        let now = Utc::now();
        let id = format!("{}_{}", format_filename_timestamp(now), screen_name);
        let text_length = text.chars().count();
        let word_count = text.split_whitespace().count();
        Record {
            id,
            timestamp: now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0,
            timestamp_iso: now.to_rfc3339(),
            screen_name,
            text,
            text_length,
            word_count,
            screenshot_path: None,
            source,
            data_type: default_data_type(),
            extra: HashMap::new(),
        }
    }

    /// Normalize a record deserialized from disk: backfill derived fields so
    /// every tool sees a fully-populated record regardless of how old or
    /// hand-edited the JSON on disk is.
    pub fn normalize(mut self, fallback_mtime: Option<SystemTime>) -> Self {
        if self.timestamp == 0.0 {
            if let Some(ts) = parse_filename_timestamp(&self.id) {
                self.timestamp = ts.timestamp() as f64 + ts.timestamp_subsec_micros() as f64 / 1_000_000.0;
                self.timestamp_iso = ts.to_rfc3339();
            } else if let Some(mtime) = fallback_mtime {
                let dt: DateTime<Utc> = mtime.into();
                self.timestamp = dt.timestamp() as f64;
                self.timestamp_iso = dt.to_rfc3339();
            }
        }
        if self.text_length == 0 && !self.text.is_empty() {
            self.text_length = self.text.chars().count();
        }
        if self.word_count == 0 && !self.text.is_empty() {
            self.word_count = self.text.split_whitespace().count();
        }
        self
    }

    /// Metadata scalar map suitable for a vector index upsert: timestamp,
    /// screen name, data type, plus any flattenable extra fields.
    pub fn vector_metadata(&self) -> HashMap<String, MetadataValue> {
        let mut meta = HashMap::new();
        meta.insert("timestamp".to_string(), MetadataValue::Number(self.timestamp));
        meta.insert(
            "screen_name".to_string(),
            MetadataValue::String(self.screen_name.clone()),
        );
        meta.insert(
            "data_type".to_string(),
            MetadataValue::String(self.data_type.clone()),
        );
        for (k, v) in flatten_metadata(&serde_json::json!(self.extra)) {
            meta.entry(k).or_insert(v);
        }
        meta
    }
}

/// Format a timestamp the way the edge capture loop names files:
/// `YYYY-MM-DDTHH-MM-SS-uuuuuu`.
pub fn format_filename_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H-%M-%S-%6f").to_string()
}

/// Parse a record id's leading timestamp component. Tolerates a filename
/// with no microseconds suffix by treating it as `.000000`.
pub fn parse_filename_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let ts_part = id.split('_').next()?;
    let normalized = if ts_part.len() >= TIMESTAMP_LEN_WITH_MICROS {
        ts_part[..TIMESTAMP_LEN_WITH_MICROS].to_string()
    } else if ts_part.len() >= TIMESTAMP_LEN_NO_MICROS {
        format!("{}-000000", &ts_part[..TIMESTAMP_LEN_NO_MICROS])
    } else {
        return None;
    };
    let naive = chrono::NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H-%M-%S-%6f").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Parse a date-only or full ISO timestamp string, defaulting the time of
/// day the way every distilled tool does: `00:00:00` for a range start,
/// `23:59:59` for a range end.
pub fn parse_flexible_timestamp(input: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let time = if end_of_day {
            chrono::NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        } else {
            chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap()
        };
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }
    chrono::NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_derives_length_and_word_count() {
        let r = Record::new("screen_0", "hello world", Some("test".into()));
        assert_eq!(r.text_length, 11);
        assert_eq!(r.word_count, 2);
        assert_eq!(r.data_type, "ocr");
    }

    #[test]
    fn filename_timestamp_round_trips() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let id = format!("{}_screen_0", format_filename_timestamp(dt));
        let parsed = parse_filename_timestamp(&id).unwrap();
        assert_eq!(parsed.timestamp(), dt.timestamp());
    }

    #[test]
    fn filename_timestamp_tolerates_missing_micros() {
        let id = "2026-01-02T03-04-05_screen_0";
        let parsed = parse_filename_timestamp(id).unwrap();
        assert_eq!(parsed.timestamp(), Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap().timestamp());
    }

    #[test]
    fn date_only_range_bounds_default_time_of_day() {
        let start = parse_flexible_timestamp("2026-01-02", false).unwrap();
        let end = parse_flexible_timestamp("2026-01-02", true).unwrap();
        assert_eq!(start.format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");
    }

    #[test]
    fn normalize_backfills_from_filename_when_timestamp_absent() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let id = format!("{}_screen_1", format_filename_timestamp(dt));
        let record = Record {
            id,
            timestamp: 0.0,
            timestamp_iso: String::new(),
            screen_name: "screen_1".into(),
            text: "some text".into(),
            text_length: 0,
            word_count: 0,
            screenshot_path: None,
            source: None,
            data_type: "ocr".into(),
            extra: HashMap::new(),
        }
        .normalize(None);
        assert_eq!(record.timestamp as i64, dt.timestamp());
        assert_eq!(record.text_length, 9);
        assert_eq!(record.word_count, 2);
    }
}
