//! Engine configuration
//!
//! All tunables of the engine live in [`EngineConfig`]. A configuration is
//! validated once, before any per-user work starts; an invalid configuration is a
//! caller bug and fails the whole batch.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Default length of the "recent activity" window in days
pub const DEFAULT_RECENT_WINDOW_DAYS: usize = 30;

/// Default dormancy horizon in days (about six months)
pub const DEFAULT_DORMANCY_HORIZON_DAYS: usize = 182;

/// Threshold used for users without any closed inactivity episode
pub const DEFAULT_THRESHOLD_DAYS: f64 = 90.0;

/// Default percentile of the closed-episode durations used as threshold
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 90.0;

/// Decay rate of the exponential relevance model
pub const DEFAULT_EXPONENTIAL_K: f64 = 1.0 / 30.0;

/// Number of standard deviations above the mean duration
pub const DEFAULT_STD_DEV_K: f64 = 2.0;

/// Smoothing factor of the exponentially weighted threshold
pub const DEFAULT_EWMA_ALPHA: f64 = 0.5;

/// Relevance decay model applied to (duration, recency)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DecayKind {
    /// `I / (1 + R)`
    #[default]
    Hyperbolic,
    /// `I * exp(-k * sqrt(R + 1))`
    Exponential { k: f64 },
    /// `I / (1 + ln(1 + R))`
    Logarithmic,
}

/// Strategy deriving a personalized threshold from past episode durations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ThresholdKind {
    /// Percentile (0-100) of the closed-episode durations
    Percentile { percentile: f64 },
    /// `mean + k * std_dev` of the closed-episode durations
    MeanStdDev { k: f64 },
    /// Exponentially weighted mean favouring the most recent episodes
    Ewma { alpha: f64 },
}

impl Default for ThresholdKind {
    fn default() -> Self {
        ThresholdKind::Percentile {
            percentile: DEFAULT_THRESHOLD_PERCENTILE,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub decay: DecayKind,
    pub threshold: ThresholdKind,
    /// Length of the window used by the Recent Activity Density feature
    pub recent_window_days: usize,
    /// Dormancy horizon; caps the personalized threshold
    pub dormancy_horizon_days: usize,
    /// Explicit fallback threshold for users with no closed episodes
    pub default_threshold_days: f64,
    /// Worker threads for batch runs (`None` uses the global rayon pool)
    pub workers: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay: DecayKind::default(),
            threshold: ThresholdKind::default(),
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            dormancy_horizon_days: DEFAULT_DORMANCY_HORIZON_DAYS,
            default_threshold_days: DEFAULT_THRESHOLD_DAYS,
            workers: None,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) configuration from JSON and validate it.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ComputeError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Check every tunable; the first violation is reported.
    pub fn validate(&self) -> Result<(), ComputeError> {
        match self.decay {
            DecayKind::Exponential { k } if !(k.is_finite() && k > 0.0) => {
                return Err(invalid(format!(
                    "exponential decay rate must be positive, got {k}"
                )));
            }
            _ => {}
        }

        match self.threshold {
            ThresholdKind::Percentile { percentile }
                if !(percentile.is_finite() && (0.0..=100.0).contains(&percentile)) =>
            {
                return Err(invalid(format!(
                    "threshold percentile must be within [0, 100], got {percentile}"
                )));
            }
            ThresholdKind::MeanStdDev { k } if !(k.is_finite() && k >= 0.0) => {
                return Err(invalid(format!(
                    "standard deviation multiplier must be non-negative, got {k}"
                )));
            }
            ThresholdKind::Ewma { alpha } if !(alpha.is_finite() && alpha > 0.0 && alpha <= 1.0) => {
                return Err(invalid(format!(
                    "EWMA smoothing factor must be within (0, 1], got {alpha}"
                )));
            }
            _ => {}
        }

        if self.recent_window_days == 0 {
            return Err(invalid("recent window must be at least one day"));
        }
        if self.dormancy_horizon_days == 0 {
            return Err(invalid("dormancy horizon must be at least one day"));
        }
        if !(self.default_threshold_days.is_finite() && self.default_threshold_days > 0.0) {
            return Err(invalid(format!(
                "default threshold must be positive, got {}",
                self.default_threshold_days
            )));
        }
        if self.workers == Some(0) {
            return Err(invalid("worker count must be at least one"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ComputeError {
    ComputeError::Configuration(message.into())
}
