//! Tool Registry (C4): the fixed, closed set of tools exposed over
//! JSON-RPC. Each tool is a pure function over the record store and
//! vector index of one instance; dispatch is a closed match, not a
//! string-keyed dynamic call (§9).

pub mod activity_graph;
pub mod daily_summary;
pub mod get_stats;
pub mod sample_time_range;
pub mod search_recent_relevant;
pub mod search_screenshots;
pub mod time_range_summary;
pub mod vector_search_windowed;
pub mod what_can_i_do;

use crate::instance::Instance;
use async_trait::async_trait;
use chrono::Utc;
use memex_core::record::parse_flexible_timestamp;
use memex_core::{Record, WhereClause};

#[derive(Debug, Clone)]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        ToolError { message: message.into() }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type ToolOutput = Result<serde_json::Value, ToolError>;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> serde_json::Value;
    async fn call(&self, instance: &Instance, args: serde_json::Value) -> ToolOutput;
}

/// The closed set of nine tools, in the order `tools/list` reports them.
/// `what-can-i-do` is built with the names of the other eight so its
/// capability blurb stays in sync with this list.
pub fn registry() -> Vec<Box<dyn Tool>> {
    let others: Vec<&'static str> = vec![
        search_screenshots::SearchScreenshots.name(),
        get_stats::GetStats.name(),
        activity_graph::ActivityGraph.name(),
        time_range_summary::TimeRangeSummary.name(),
        sample_time_range::SampleTimeRange.name(),
        vector_search_windowed::VectorSearchWindowed.name(),
        search_recent_relevant::SearchRecentRelevant.name(),
        daily_summary::DailySummary.name(),
    ];
    vec![
        Box::new(search_screenshots::SearchScreenshots),
        Box::new(get_stats::GetStats),
        Box::new(activity_graph::ActivityGraph),
        Box::new(time_range_summary::TimeRangeSummary),
        Box::new(sample_time_range::SampleTimeRange),
        Box::new(vector_search_windowed::VectorSearchWindowed),
        Box::new(search_recent_relevant::SearchRecentRelevant),
        Box::new(daily_summary::DailySummary),
        Box::new(what_can_i_do::WhatCanIDo::new(others)),
    ]
}

/// Round to 3 decimals, matching every tool's relevance rendering.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// `max(0, 1 - distance)`, in `[0, 1]` — the glossary's "relevance".
pub fn relevance(distance: f64) -> f64 {
    round3((1.0 - distance).max(0.0))
}

/// Resolve a tool's `start`/`end` string arguments into epoch-seconds
/// bounds, defaulting to the last 30 days when absent.
pub fn resolve_range(args: &serde_json::Value) -> Result<(f64, f64), ToolError> {
    let now = Utc::now();
    let start = match args.get("start").and_then(|v| v.as_str()) {
        Some(s) => parse_flexible_timestamp(s, false).ok_or_else(|| ToolError::new(format!("invalid start: {s}")))?,
        None => now - chrono::Duration::days(30),
    };
    let end = match args.get("end").and_then(|v| v.as_str()) {
        Some(s) => parse_flexible_timestamp(s, true).ok_or_else(|| ToolError::new(format!("invalid end: {s}")))?,
        None => now,
    };
    Ok((start.timestamp() as f64, end.timestamp() as f64))
}

/// Compose a timestamp range filter (`$gte`/`$lte`) with an optional
/// `data_type == "ocr"` filter under `$and`, per §4.4.
pub fn range_where(start: f64, end: f64) -> WhereClause {
    WhereClause::And(vec![
        WhereClause::Gte("timestamp".to_string(), start),
        WhereClause::Lte("timestamp".to_string(), end),
    ])
}

/// Evenly distributed sample of `items`, taking `items[floor(i*step)]` for
/// `i in 0..max_results` when `items.len() > max_results`; returns the
/// whole slice unchanged otherwise. Deterministic, not random (§4.4).
pub fn evenly_sample<'a, T>(items: &'a [T], max_results: usize) -> Vec<&'a T> {
    if max_results == 0 || items.is_empty() {
        return Vec::new();
    }
    if items.len() <= max_results {
        return items.iter().collect();
    }
    let step = items.len() as f64 / max_results as f64;
    (0..max_results)
        .map(|i| &items[((i as f64) * step).floor() as usize])
        .collect()
}

pub fn sort_by_timestamp(records: &mut [Record]) {
    records.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());
}
