//! Output table encoding
//!
//! Encodes profiled users as JSON, NDJSON or CSV. Column names and their order are
//! stable: CSV uses [`OUTPUT_COLUMNS`] as its header and JSON objects list their keys
//! in the same order.

use crate::error::ComputeError;
use crate::types::{BatchReport, RiskLevel, ThresholdSource, UserError, UserProfile};

/// Output columns in table order
pub const OUTPUT_COLUMNS: [&str; 18] = [
    "User ID",
    "Activity Ratio",
    "Number of Inactivity Episodes",
    "Average Recency",
    "Minimum Recency",
    "Average Relevance",
    "Maximum Relevance",
    "Activity Periodicity Score",
    "Inactivity Linearity",
    "Activity Variability",
    "Inactivity Growth Rate",
    "Recent Activity Density",
    "6 Months Dormancy",
    "Dormancy Threshold",
    "Threshold Source",
    "Risk Level",
    "Current Streak",
    "Expected Inactivity",
];

/// Table encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// Full report as a compact JSON object
    Json,
    /// Full report as an indented JSON object
    JsonPretty,
    /// One row object per line
    #[default]
    Ndjson,
    /// Header plus one line per row, floats rounded to 2 decimals
    Csv,
}

/// Encoder for output rows and batch reports
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportEncoder {
    format: TableFormat,
}

impl ReportEncoder {
    pub fn new(format: TableFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }

    /// Encode output rows only
    pub fn encode_rows(&self, rows: &[UserProfile]) -> Result<String, ComputeError> {
        match self.format {
            TableFormat::Json => Ok(serde_json::to_string(rows)?),
            TableFormat::JsonPretty => Ok(serde_json::to_string_pretty(rows)?),
            TableFormat::Ndjson => encode_ndjson(rows),
            TableFormat::Csv => Ok(encode_csv(rows)),
        }
    }

    /// Encode a batch report.
    ///
    /// JSON formats carry the metadata and per-user errors alongside the rows; the
    /// line-oriented formats hold the rows only.
    pub fn encode_report(&self, report: &BatchReport) -> Result<String, ComputeError> {
        match self.format {
            TableFormat::Json => Ok(serde_json::to_string(report)?),
            TableFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)?),
            TableFormat::Ndjson | TableFormat::Csv => self.encode_rows(&report.rows),
        }
    }
}

/// Encode per-user errors as NDJSON
pub fn encode_errors(errors: &[UserError]) -> Result<String, ComputeError> {
    encode_ndjson(errors)
}

fn encode_ndjson<T: serde::Serialize>(items: &[T]) -> Result<String, ComputeError> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    Ok(out)
}

fn encode_csv(rows: &[UserProfile]) -> String {
    let mut out = OUTPUT_COLUMNS.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&csv_record(row).join(","));
        out.push('\n');
    }
    out
}

/// Cells of one row in `OUTPUT_COLUMNS` order
fn csv_record(row: &UserProfile) -> Vec<String> {
    let f = &row.features;
    let l = &row.label;
    vec![
        csv_escape(&f.user_id),
        round2(f.activity_ratio),
        f.num_episodes.to_string(),
        round2(f.avg_recency),
        f.min_recency.to_string(),
        round2(f.avg_relevance),
        round2(f.max_relevance),
        round2(f.activity_periodicity_score),
        round2(f.inactivity_linearity),
        round2(f.activity_variability),
        round2(f.inactivity_growth_rate),
        round2(f.recent_activity_density),
        l.at_risk.to_string(),
        round2(l.threshold_days),
        threshold_source_str(l.threshold_source).to_string(),
        risk_level_str(l.risk_level).to_string(),
        l.current_streak_days.to_string(),
        round2(l.expected_inactivity_days),
    ]
}

fn round2(value: f64) -> String {
    format!("{value:.2}")
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn threshold_source_str(source: ThresholdSource) -> &'static str {
    match source {
        ThresholdSource::Personalized => "personalized",
        ThresholdSource::Default => "default",
    }
}

fn risk_level_str(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Active => "active",
        RiskLevel::Watch => "watch",
        RiskLevel::AtRisk => "at_risk",
    }
}
