//! Personalized inactivity thresholds
//!
//! A threshold strategy maps a user's closed-episode durations (in time order) to
//! the streak length, in days, beyond which that user's current inactivity is
//! considered abnormal. Strategies are pure and know nothing about the comparison
//! made by the classifier.

use crate::config::ThresholdKind;
use crate::stats;

/// Derives a threshold from historical episode durations
pub trait ThresholdStrategy: Send + Sync {
    /// Threshold in days, or `None` when the history is empty
    fn threshold(&self, durations: &[usize]) -> Option<f64>;
}

/// Percentile (0-100) of the historical durations
#[derive(Debug, Clone, Copy)]
pub struct PercentileThreshold {
    pub percentile: f64,
}

impl ThresholdStrategy for PercentileThreshold {
    fn threshold(&self, durations: &[usize]) -> Option<f64> {
        let mut sorted: Vec<f64> = durations.iter().map(|&d| d as f64).collect();
        sorted.sort_by(f64::total_cmp);
        stats::percentile(&sorted, self.percentile)
    }
}

/// Formula: `mean + k * std_dev`
#[derive(Debug, Clone, Copy)]
pub struct MeanStdDevThreshold {
    pub k: f64,
}

impl ThresholdStrategy for MeanStdDevThreshold {
    fn threshold(&self, durations: &[usize]) -> Option<f64> {
        let values: Vec<f64> = durations.iter().map(|&d| d as f64).collect();
        Some(stats::mean(&values)? + self.k * stats::std_dev(&values)?)
    }
}

/// Exponentially weighted mean, oldest episode first.
///
/// Formula: `s = alpha * d + (1 - alpha) * s`, seeded with the first duration.
#[derive(Debug, Clone, Copy)]
pub struct EwmaThreshold {
    pub alpha: f64,
}

impl ThresholdStrategy for EwmaThreshold {
    fn threshold(&self, durations: &[usize]) -> Option<f64> {
        let (&first, rest) = durations.split_first()?;
        Some(rest.iter().fold(first as f64, |s, &d| {
            self.alpha * d as f64 + (1.0 - self.alpha) * s
        }))
    }
}

/// Build the threshold strategy selected in the configuration
pub fn threshold_strategy(kind: ThresholdKind) -> Box<dyn ThresholdStrategy> {
    match kind {
        ThresholdKind::Percentile { percentile } => Box::new(PercentileThreshold { percentile }),
        ThresholdKind::MeanStdDev { k } => Box::new(MeanStdDevThreshold { k }),
        ThresholdKind::Ewma { alpha } => Box::new(EwmaThreshold { alpha }),
    }
}
