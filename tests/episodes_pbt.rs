//! Property-Based Tests for episode detection, scoring and batch ordering
//!
//! Tests the following invariants:
//! - Rows without inactivity produce no episodes and an activity ratio of 1
//! - Rows without activity produce no episodes and an activity ratio of 0
//! - Episode recency never increases along the row; only a final episode can be ongoing
//! - Relevance grows with duration and decays with recency for every decay model
//! - Feature extraction is deterministic
//! - Batch output keeps input order

use proptest::prelude::*;

use rfi_dormancy::config::{DecayKind, EngineConfig};
use rfi_dormancy::matrix::{ActivityMatrix, UserActivity};
use rfi_dormancy::scoring::{decay_model, DecayModel};
use rfi_dormancy::{DormancyEngine, EpisodeDetector, FeatureExtractor, RfiScorer};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_row() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..=1u8, 1..200)
}

fn arb_decay_kind() -> impl Strategy<Value = DecayKind> {
    prop_oneof![
        Just(DecayKind::Hyperbolic),
        (0.001f64..=1.0f64).prop_map(|k| DecayKind::Exponential { k }),
        Just(DecayKind::Logarithmic),
    ]
}

fn arb_matrix() -> impl Strategy<Value = (usize, Vec<Vec<u8>>)> {
    (5usize..60).prop_flat_map(|window| {
        (
            Just(window),
            prop::collection::vec(prop::collection::vec(0u8..=1u8, window), 1..40),
        )
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn all_active_row_has_no_episodes(len in 1usize..400) {
        let row = vec![1u8; len];
        let episodes = RfiScorer::default().score(&EpisodeDetector::detect(&row));
        prop_assert!(episodes.is_empty());

        let features = FeatureExtractor::default().extract("u", &row, &episodes);
        prop_assert_eq!(features.num_episodes, 0);
        prop_assert_eq!(features.activity_ratio, 1.0);
    }

    #[test]
    fn all_inactive_row_has_no_episodes(len in 1usize..400) {
        let row = vec![0u8; len];
        let episodes = RfiScorer::default().score(&EpisodeDetector::detect(&row));
        prop_assert!(episodes.is_empty());

        let features = FeatureExtractor::default().extract("u", &row, &episodes);
        prop_assert_eq!(features.activity_ratio, 0.0);
    }

    #[test]
    fn recency_non_increasing_along_row(row in arb_row()) {
        let episodes = EpisodeDetector::detect(&row);

        for pair in episodes.windows(2) {
            prop_assert!(pair[0].end_index < pair[1].start_index);
            prop_assert!(pair[0].recency >= pair[1].recency);
            prop_assert!(!pair[0].is_ongoing());
        }

        let ends_inactive = row.last() == Some(&0);
        if let Some(last) = episodes.last() {
            prop_assert_eq!(last.is_ongoing(), ends_inactive);
        }

        let inactive_after_first_active = row
            .iter()
            .skip_while(|&&v| v == 0)
            .filter(|&&v| v == 0)
            .count();
        let covered: usize = episodes.iter().map(|e| e.duration).sum();
        prop_assert_eq!(covered, inactive_after_first_active);
    }

    #[test]
    fn relevance_monotone_in_duration_and_recency(
        kind in arb_decay_kind(),
        duration in 1usize..180,
        recency in 0usize..180,
    ) {
        let model = decay_model(kind);
        let base = model.relevance(duration, recency);

        prop_assert!(base > 0.0);
        prop_assert!(model.relevance(duration + 1, recency) > base);
        prop_assert!(model.relevance(duration, recency + 1) < base);
    }

    #[test]
    fn feature_extraction_is_deterministic(row in arb_row()) {
        let episodes = RfiScorer::default().score(&EpisodeDetector::detect(&row));
        let extractor = FeatureExtractor::default();
        let first = extractor.extract("u", &row, &episodes);
        let second = extractor.extract("u", &row, &episodes);

        prop_assert_eq!(first.activity_periodicity_score.to_bits(), second.activity_periodicity_score.to_bits());
        prop_assert_eq!(first.inactivity_linearity.to_bits(), second.inactivity_linearity.to_bits());
        prop_assert_eq!(first.activity_variability.to_bits(), second.activity_variability.to_bits());
        prop_assert_eq!(first.inactivity_growth_rate.to_bits(), second.inactivity_growth_rate.to_bits());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn batch_output_keeps_input_order(matrix_rows in arb_matrix(), workers in 1usize..5) {
        let (window, rows) = matrix_rows;
        let users: Vec<UserActivity> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                UserActivity::new(format!("user-{i}"), row.iter().map(|&v| i64::from(v)).collect())
            })
            .collect();
        let matrix = ActivityMatrix::new(window, users).unwrap();

        let engine = DormancyEngine::new(EngineConfig {
            workers: Some(workers),
            ..Default::default()
        })
        .unwrap();
        let report = engine.run_batch(&matrix).unwrap();

        prop_assert!(report.errors.is_empty());
        let ids: Vec<&str> = report.rows.iter().map(|r| r.user_id()).collect();
        let expected: Vec<String> = (0..rows.len()).map(|i| format!("user-{i}")).collect();
        prop_assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
