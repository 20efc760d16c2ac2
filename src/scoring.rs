//! Recency / relevance scoring
//!
//! Every episode gets a relevance score combining its duration I and recency R.
//! The decay shape is a [`DecayModel`] so it can be swapped without touching
//! detection or feature extraction.

use std::collections::BTreeMap;

use crate::config::DecayKind;
use crate::types::{InactivityEpisode, RfiRow, ScoredEpisode};

/// Relevance as a function of duration and recency.
///
/// Implementations must be increasing in `duration` for a fixed `recency` and
/// decreasing in `recency` for a fixed `duration`.
pub trait DecayModel: Send + Sync {
    fn relevance(&self, duration: usize, recency: usize) -> f64;
}

/// Formula: `I / (1 + R)`
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperbolicDecay;

impl DecayModel for HyperbolicDecay {
    fn relevance(&self, duration: usize, recency: usize) -> f64 {
        duration as f64 / (1.0 + recency as f64)
    }
}

/// Formula: `I * exp(-k * sqrt(R + 1))`
///
/// With the default `k = 1/30` an episode that ended three months ago keeps
/// roughly 73% of its weight.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialDecay {
    pub k: f64,
}

impl DecayModel for ExponentialDecay {
    fn relevance(&self, duration: usize, recency: usize) -> f64 {
        duration as f64 * (-self.k * (recency as f64 + 1.0).sqrt()).exp()
    }
}

/// Formula: `I / (1 + ln(1 + R))`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogarithmicDecay;

impl DecayModel for LogarithmicDecay {
    fn relevance(&self, duration: usize, recency: usize) -> f64 {
        duration as f64 / (1.0 + (recency as f64).ln_1p())
    }
}

/// Build the decay model selected in the configuration
pub fn decay_model(kind: DecayKind) -> Box<dyn DecayModel> {
    match kind {
        DecayKind::Hyperbolic => Box::new(HyperbolicDecay),
        DecayKind::Exponential { k } => Box::new(ExponentialDecay { k }),
        DecayKind::Logarithmic => Box::new(LogarithmicDecay),
    }
}

/// Scores episodes with a decay model
pub struct RfiScorer {
    model: Box<dyn DecayModel>,
}

impl Default for RfiScorer {
    fn default() -> Self {
        Self::new(Box::new(HyperbolicDecay))
    }
}

impl RfiScorer {
    pub fn new(model: Box<dyn DecayModel>) -> Self {
        Self { model }
    }

    pub fn from_kind(kind: DecayKind) -> Self {
        Self::new(decay_model(kind))
    }

    /// Annotate each episode with its relevance, preserving order
    pub fn score(&self, episodes: &[InactivityEpisode]) -> Vec<ScoredEpisode> {
        episodes
            .iter()
            .map(|&episode| ScoredEpisode {
                episode,
                relevance: self.model.relevance(episode.duration, episode.recency),
            })
            .collect()
    }

    /// Summarize episodes into the RFI matrix.
    ///
    /// Closed episodes are grouped by duration I with frequency F and the smallest
    /// recency R of the group; an ongoing episode is its own row with F = 1, R = 0.
    /// Row relevance is `F * relevance(I, R)`. Rows are sorted by R, then I.
    pub fn rfi_matrix(&self, episodes: &[InactivityEpisode]) -> Vec<RfiRow> {
        let mut groups: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        let mut ongoing = None;

        for episode in episodes {
            if episode.is_ongoing() {
                ongoing = Some(episode.duration);
                continue;
            }
            groups
                .entry(episode.duration)
                .and_modify(|(frequency, recency)| {
                    *frequency += 1;
                    *recency = (*recency).min(episode.recency);
                })
                .or_insert((1, episode.recency));
        }

        let mut rows: Vec<RfiRow> = groups
            .into_iter()
            .map(|(duration, (frequency, recency))| self.rfi_row(duration, frequency, recency))
            .collect();

        if let Some(duration) = ongoing {
            rows.push(self.rfi_row(duration, 1, 0));
        }

        rows.sort_by_key(|r| (r.recency, r.duration));
        rows
    }

    fn rfi_row(&self, duration: usize, frequency: usize, recency: usize) -> RfiRow {
        RfiRow {
            recency,
            frequency,
            duration,
            relevance: frequency as f64 * self.model.relevance(duration, recency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episodes::EpisodeDetector;
    use pretty_assertions::assert_eq;

    const MODELS: [DecayKind; 3] = [
        DecayKind::Hyperbolic,
        DecayKind::Exponential { k: 1.0 / 30.0 },
        DecayKind::Logarithmic,
    ];

    #[test]
    fn test_hyperbolic_relevance() {
        let model = HyperbolicDecay;
        assert!((model.relevance(3, 4) - 0.6).abs() < 1e-12);
        assert!((model.relevance(1, 1) - 0.5).abs() < 1e-12);
        assert!((model.relevance(2, 0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_relevance() {
        let model = ExponentialDecay { k: 1.0 / 30.0 };
        let expected = 10.0 * (-(1.0f64 / 30.0) * 3.0).exp(); // R = 8 -> sqrt(9) = 3
        assert!((model.relevance(10, 8) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_models_increase_with_duration() {
        for kind in MODELS {
            let model = decay_model(kind);
            for recency in [0, 1, 10, 100] {
                assert!(
                    model.relevance(5, recency) > model.relevance(4, recency),
                    "{kind:?} at R={recency}"
                );
            }
        }
    }

    #[test]
    fn test_models_decrease_with_recency() {
        for kind in MODELS {
            let model = decay_model(kind);
            for duration in [1, 7, 60] {
                assert!(
                    model.relevance(duration, 3) < model.relevance(duration, 2),
                    "{kind:?} at I={duration}"
                );
            }
        }
    }

    #[test]
    fn test_score_preserves_order() {
        let episodes = EpisodeDetector::detect(&[1, 1, 0, 0, 0, 1, 1, 0, 1]);
        let scored = RfiScorer::default().score(&episodes);
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].episode, episodes[0]);
        assert!((scored[0].relevance - 0.6).abs() < 1e-12);
        assert!((scored[1].relevance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rfi_matrix_groups_by_duration() {
        // episodes: I=2 (R=10), I=1 (R=8), I=2 (R=4), ongoing I=2
        let row = [1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 0];
        let episodes = EpisodeDetector::detect(&row);
        assert_eq!(episodes.len(), 4);

        let matrix = RfiScorer::default().rfi_matrix(&episodes);
        assert_eq!(
            matrix
                .iter()
                .map(|r| (r.recency, r.frequency, r.duration))
                .collect::<Vec<_>>(),
            vec![(0, 1, 2), (4, 2, 2), (8, 1, 1)]
        );
        // grouped row: 2 * (2 / (1 + 4))
        assert!((matrix[1].relevance - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_rfi_matrix_empty() {
        assert!(RfiScorer::default().rfi_matrix(&[]).is_empty());
    }
}
