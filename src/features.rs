//! Feature extraction
//!
//! Reduces a user's activity row and scored episodes into the eleven summary
//! features. Features that are undefined for the input take a sentinel instead of
//! failing:
//!
//! | condition | features | sentinel |
//! |---|---|---|
//! | no episodes | average/minimum recency, average/maximum relevance | 0 |
//! | fewer than 2 episodes | inactivity linearity | 0 |
//! | fewer than 2 episodes | inactivity growth rate | 1 (neutral) |
//! | fewer than 2 active days | periodicity score, activity variability | 0 |
//! | empty row | activity ratio, recent activity density | 0 |

use crate::config::DEFAULT_RECENT_WINDOW_DAYS;
use crate::stats;
use crate::types::{FeatureVector, ScoredEpisode};

/// Feature extractor for one user
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    recent_window_days: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_WINDOW_DAYS)
    }
}

impl FeatureExtractor {
    pub fn new(recent_window_days: usize) -> Self {
        Self { recent_window_days }
    }

    /// Compute the feature vector from a 0/1 row and its scored episodes
    pub fn extract(&self, user_id: &str, row: &[u8], episodes: &[ScoredEpisode]) -> FeatureVector {
        let gaps = active_day_gaps(row);

        let recencies: Vec<f64> = episodes.iter().map(|e| e.episode.recency as f64).collect();
        let durations: Vec<f64> = episodes.iter().map(|e| e.episode.duration as f64).collect();
        let relevances: Vec<f64> = episodes.iter().map(|e| e.relevance).collect();

        FeatureVector {
            user_id: user_id.to_string(),
            activity_ratio: compute_activity_ratio(row),
            num_episodes: episodes.len(),
            avg_recency: stats::mean(&recencies).unwrap_or(0.0),
            min_recency: episodes
                .iter()
                .map(|e| e.episode.recency)
                .min()
                .unwrap_or(0),
            avg_relevance: stats::mean(&relevances).unwrap_or(0.0),
            max_relevance: relevances.iter().copied().reduce(f64::max).unwrap_or(0.0),
            activity_periodicity_score: compute_periodicity_score(&gaps),
            inactivity_linearity: compute_inactivity_linearity(&recencies, &durations),
            activity_variability: stats::std_dev(&gaps).unwrap_or(0.0),
            inactivity_growth_rate: compute_growth_rate(&durations),
            recent_activity_density: compute_recent_density(row, self.recent_window_days),
        }
    }
}

/// Day offsets between consecutive active days
fn active_day_gaps(row: &[u8]) -> Vec<f64> {
    let active: Vec<usize> = row
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0)
        .map(|(day, _)| day)
        .collect();
    active.windows(2).map(|w| (w[1] - w[0]) as f64).collect()
}

/// Formula: `active_days / T`
fn compute_activity_ratio(row: &[u8]) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    count_active(row) as f64 / row.len() as f64
}

/// Formula: `clamp(1 - std_dev(gaps) / mean(gaps), 0, 1)`
///
/// 1.0 means active days recur at a perfectly regular interval.
fn compute_periodicity_score(gaps: &[f64]) -> f64 {
    match stats::coefficient_of_variation(gaps) {
        Some(cv) => (1.0 - cv).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Squared Pearson correlation between episode recency R and duration I
fn compute_inactivity_linearity(recencies: &[f64], durations: &[f64]) -> f64 {
    stats::pearson(recencies, durations).map_or(0.0, |r| r * r)
}

/// Formula: `mean(I[k+1] / I[k])` over consecutive episodes
///
/// Above 1 means inactivity episodes are getting longer.
fn compute_growth_rate(durations: &[f64]) -> f64 {
    let ratios: Vec<f64> = durations.windows(2).map(|w| w[1] / w[0]).collect();
    stats::mean(&ratios).unwrap_or(1.0)
}

/// Formula: `active days in the last W days / W` with `W = min(window, T)`
fn compute_recent_density(row: &[u8], recent_window_days: usize) -> f64 {
    let window = recent_window_days.min(row.len());
    if window == 0 {
        return 0.0;
    }
    count_active(&row[row.len() - window..]) as f64 / window as f64
}

fn count_active(days: &[u8]) -> usize {
    days.iter().filter(|&&v| v != 0).count()
}
