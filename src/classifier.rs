//! Dormancy classification
//!
//! Compares a user's ongoing inactivity streak against a threshold derived from that
//! user's own closed-episode history. Users without closed episodes fall back to the
//! configured default threshold, and the label records which source was used.

use log::debug;

use crate::config::EngineConfig;
use crate::episodes::EpisodeDetector;
use crate::threshold::{threshold_strategy, ThresholdStrategy};
use crate::types::{DormancyLabel, InactivityEpisode, RiskLevel, ScoredEpisode, ThresholdSource};

/// Per-user dormancy classifier
pub struct DormancyClassifier {
    strategy: Box<dyn ThresholdStrategy>,
    horizon_days: usize,
    default_threshold_days: f64,
}

impl Default for DormancyClassifier {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DormancyClassifier {
    pub fn new(
        strategy: Box<dyn ThresholdStrategy>,
        horizon_days: usize,
        default_threshold_days: f64,
    ) -> Self {
        Self {
            strategy,
            horizon_days,
            default_threshold_days,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            threshold_strategy(config.threshold),
            config.dormancy_horizon_days,
            config.default_threshold_days,
        )
    }

    /// Threshold for a closed-episode history, capped at the dormancy horizon and
    /// never below one day.
    pub fn personalized_threshold(&self, history: &[usize]) -> (f64, ThresholdSource) {
        let (threshold, source) = match self.strategy.threshold(history).filter(|t| t.is_finite()) {
            Some(t) => (t, ThresholdSource::Personalized),
            None => (self.default_threshold_days, ThresholdSource::Default),
        };
        (threshold.min(self.horizon_days as f64).max(1.0), source)
    }

    /// Label a user from closed-episode durations and the current streak length
    pub fn classify(
        &self,
        history: &[usize],
        current_streak_days: usize,
        expected_inactivity_days: f64,
    ) -> DormancyLabel {
        let (threshold_days, threshold_source) = self.personalized_threshold(history);
        let at_risk = current_streak_days > 0 && current_streak_days as f64 >= threshold_days;

        let risk_level = if at_risk {
            RiskLevel::AtRisk
        } else if current_streak_days > 0 {
            RiskLevel::Watch
        } else {
            RiskLevel::Active
        };

        debug!(
            "threshold {threshold_days:.1} days ({threshold_source:?}, {} past episodes), streak {current_streak_days} -> {risk_level:?}",
            history.len()
        );

        DormancyLabel {
            at_risk,
            threshold_days,
            threshold_source,
            risk_level,
            current_streak_days,
            expected_inactivity_days,
        }
    }

    /// Label a user from their scored episode sequence
    pub fn classify_episodes(&self, episodes: &[ScoredEpisode]) -> DormancyLabel {
        let raw: Vec<InactivityEpisode> = episodes.iter().map(|e| e.episode).collect();
        self.classify(
            &EpisodeDetector::closed_durations(&raw),
            EpisodeDetector::current_streak(&raw),
            expected_inactivity(episodes),
        )
    }
}

/// Relevance-weighted average episode duration, rounded to whole days.
///
/// Formula: `round(sum(I * relevance) / sum(relevance))`, 0 when total relevance is 0.
pub fn expected_inactivity(episodes: &[ScoredEpisode]) -> f64 {
    let total: f64 = episodes.iter().map(|e| e.relevance).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = episodes
        .iter()
        .map(|e| e.episode.duration as f64 * e.relevance)
        .sum();
    (weighted / total).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdKind;
    use crate::scoring::RfiScorer;
    use crate::threshold::PercentileThreshold;

    fn classifier(percentile: f64) -> DormancyClassifier {
        DormancyClassifier::new(Box::new(PercentileThreshold { percentile }), 182, 90.0)
    }

    fn scored(row: &[u8]) -> Vec<ScoredEpisode> {
        RfiScorer::default().score(&EpisodeDetector::detect(row))
    }

    #[test]
    fn test_active_user_not_at_risk() {
        let label = classifier(90.0).classify(&[3, 4, 5], 0, 0.0);
        assert!(!label.at_risk);
        assert_eq!(label.risk_level, RiskLevel::Active);
        assert_eq!(label.threshold_source, ThresholdSource::Personalized);
    }

    #[test]
    fn test_streak_above_personalized_threshold() {
        // p90 of [3, 4, 5] = 4.8
        let label = classifier(90.0).classify(&[3, 4, 5], 5, 0.0);
        assert!(label.at_risk);
        assert_eq!(label.risk_level, RiskLevel::AtRisk);
        assert!((label.threshold_days - 4.8).abs() < 1e-9);

        let label = classifier(90.0).classify(&[3, 4, 5], 4, 0.0);
        assert!(!label.at_risk);
        assert_eq!(label.risk_level, RiskLevel::Watch);
    }

    #[test]
    fn test_no_history_uses_default_threshold() {
        let label = classifier(90.0).classify(&[], 2, 0.0);
        assert_eq!(label.threshold_source, ThresholdSource::Default);
        assert_eq!(label.threshold_days, 90.0);
        assert!(!label.at_risk);

        let label = classifier(90.0).classify(&[], 120, 0.0);
        assert!(label.at_risk);
    }

    #[test]
    fn test_threshold_capped_at_horizon() {
        let (threshold, source) = classifier(100.0).personalized_threshold(&[300, 400]);
        assert_eq!(threshold, 182.0);
        assert_eq!(source, ThresholdSource::Personalized);

        let label = classifier(100.0).classify(&[300, 400], 182, 0.0);
        assert!(label.at_risk);
    }

    #[test]
    fn test_threshold_floor_is_one_day() {
        let classifier = DormancyClassifier::new(
            threshold_strategy(ThresholdKind::MeanStdDev { k: 0.0 }),
            182,
            90.0,
        );
        let (threshold, _) = classifier.personalized_threshold(&[1, 1]);
        assert_eq!(threshold, 1.0);
    }

    #[test]
    fn test_classify_episodes_splits_history_and_streak() {
        // closed: I=3, I=1; ongoing: I=2
        let episodes = scored(&[1, 1, 0, 0, 0, 1, 0, 1, 0, 0]);
        let label = classifier(50.0).classify_episodes(&episodes);
        assert_eq!(label.current_streak_days, 2);
        // median of [3, 1] = 2
        assert!((label.threshold_days - 2.0).abs() < 1e-9);
        assert!(label.at_risk);
    }

    #[test]
    fn test_ongoing_only_user_falls_back_to_default() {
        let label = DormancyClassifier::default().classify_episodes(&scored(&[1, 0, 0]));
        assert_eq!(label.threshold_source, ThresholdSource::Default);
        assert_eq!(label.current_streak_days, 2);
        assert_eq!(label.risk_level, RiskLevel::Watch);
    }

    #[test]
    fn test_expected_inactivity_weighted_by_relevance() {
        // relevances 0.6 (I=3) and 0.5 (I=1): (1.8 + 0.5) / 1.1 = 2.09 -> 2
        let episodes = scored(&[1, 1, 0, 0, 0, 1, 1, 0, 1]);
        assert_eq!(expected_inactivity(&episodes), 2.0);
        assert_eq!(expected_inactivity(&[]), 0.0);
    }
}
