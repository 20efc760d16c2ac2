//! Core data types for the RFI dormancy engine
//!
//! These types represent data at the successive stages of the per-user pipeline:
//! Activity row → Episodes → Scored episodes → Features + Dormancy label → Report

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ComputeError;

/// Subscriber identifier as it appears in the activity matrix
pub type UserId = String;

/// A maximal run of inactive days in one user's activity row.
///
/// Indices are 0-based day offsets into the row and both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactivityEpisode {
    pub start_index: usize,
    pub end_index: usize,
    /// Duration I in days (`end_index - start_index + 1`)
    pub duration: usize,
    /// Recency R in days between the episode end and the last day of the window.
    /// Zero means the episode is still ongoing at window end.
    pub recency: usize,
}

impl InactivityEpisode {
    /// Build an episode covering `start_index..=end_index` in a window of `window_days`.
    ///
    /// Callers guarantee `start_index <= end_index < window_days`.
    pub fn new(start_index: usize, end_index: usize, window_days: usize) -> Self {
        Self {
            start_index,
            end_index,
            duration: end_index - start_index + 1,
            recency: window_days - 1 - end_index,
        }
    }

    /// True if the episode runs through the last day of the window
    pub fn is_ongoing(&self) -> bool {
        self.recency == 0
    }
}

/// An inactivity episode annotated with its relevance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredEpisode {
    #[serde(flatten)]
    pub episode: InactivityEpisode,
    /// Higher for longer and/or more recent episodes
    pub relevance: f64,
}

/// One row of the per-user RFI summary matrix.
///
/// Closed episodes are grouped by duration; an ongoing episode always gets its own row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfiRow {
    /// Minimum recency among the grouped episodes
    #[serde(rename = "R")]
    pub recency: usize,
    /// Number of episodes with this duration
    #[serde(rename = "F")]
    pub frequency: usize,
    /// Episode duration shared by the group
    #[serde(rename = "I")]
    pub duration: usize,
    #[serde(rename = "Relevance")]
    pub relevance: f64,
}

/// The eleven per-user summary features.
///
/// Serialized field names are the stable output column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "User ID")]
    pub user_id: UserId,
    #[serde(rename = "Activity Ratio")]
    pub activity_ratio: f64,
    #[serde(rename = "Number of Inactivity Episodes")]
    pub num_episodes: usize,
    #[serde(rename = "Average Recency")]
    pub avg_recency: f64,
    #[serde(rename = "Minimum Recency")]
    pub min_recency: usize,
    #[serde(rename = "Average Relevance")]
    pub avg_relevance: f64,
    #[serde(rename = "Maximum Relevance")]
    pub max_relevance: f64,
    #[serde(rename = "Activity Periodicity Score")]
    pub activity_periodicity_score: f64,
    #[serde(rename = "Inactivity Linearity")]
    pub inactivity_linearity: f64,
    #[serde(rename = "Activity Variability")]
    pub activity_variability: f64,
    #[serde(rename = "Inactivity Growth Rate")]
    pub inactivity_growth_rate: f64,
    #[serde(rename = "Recent Activity Density")]
    pub recent_activity_density: f64,
}

/// Where the dormancy threshold came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    /// Derived from the user's own closed-episode durations
    Personalized,
    /// The user had no closed episodes; the configured default was used
    Default,
}

/// Coarse dormancy category derived from the label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Active on the last day of the window
    Active,
    /// Inactive at window end, but the streak is still within the user's normal range
    Watch,
    /// Ongoing streak has reached the personalized threshold
    AtRisk,
}

/// Per-user 6-month dormancy prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DormancyLabel {
    #[serde(rename = "6 Months Dormancy")]
    pub at_risk: bool,
    #[serde(rename = "Dormancy Threshold")]
    pub threshold_days: f64,
    #[serde(rename = "Threshold Source")]
    pub threshold_source: ThresholdSource,
    #[serde(rename = "Risk Level")]
    pub risk_level: RiskLevel,
    /// Length of the inactivity streak running through window end (0 if active)
    #[serde(rename = "Current Streak")]
    pub current_streak_days: usize,
    /// Relevance-weighted average episode duration, in whole days
    #[serde(rename = "Expected Inactivity")]
    pub expected_inactivity_days: f64,
}

/// One row of the output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub features: FeatureVector,
    #[serde(flatten)]
    pub label: DormancyLabel,
}

impl UserProfile {
    pub fn user_id(&self) -> &str {
        &self.features.user_id
    }
}

/// Single-user query result: the output row plus the intermediate tables behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    pub profile: UserProfile,
    pub episodes: Vec<ScoredEpisode>,
    pub rfi_matrix: Vec<RfiRow>,
}

/// Why a user was excluded from the output table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserErrorKind {
    InputShape,
    Cancelled,
}

/// A per-user failure recorded during a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    /// Row position in the input matrix
    pub index: usize,
    pub user_id: UserId,
    pub kind: UserErrorKind,
    pub message: String,
}

/// Batch run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub engine: String,
    pub version: String,
    pub run_id: String,
    pub computed_at_utc: String,
    pub window_days: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub total_users: usize,
    pub config: EngineConfig,
}

/// Result of a batch run: the (possibly partial) table plus every excluded user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub metadata: BatchMetadata,
    /// Output rows in input order
    pub rows: Vec<UserProfile>,
    /// Excluded users in input order
    pub errors: Vec<UserError>,
    pub cancelled: bool,
}

impl BatchReport {
    /// Look up an output row by user id
    pub fn row(&self, user_id: &str) -> Option<&UserProfile> {
        self.rows.iter().find(|r| r.user_id() == user_id)
    }

    /// Users flagged at risk of 6-month dormancy
    pub fn at_risk(&self) -> impl Iterator<Item = &UserProfile> {
        self.rows.iter().filter(|r| r.label.at_risk)
    }

    /// Fail with `Cancelled` unless every user was attempted
    pub fn require_complete(self) -> Result<Self, ComputeError> {
        if self.cancelled {
            return Err(ComputeError::Cancelled);
        }
        Ok(self)
    }
}
