//! Pipeline orchestration
//!
//! Public API for running the engine. Per user the stages are:
//! Activity row → Episodes → Scored episodes → Features → Dormancy label
//!
//! Users are independent, so a batch maps them in parallel and collects the
//! outcomes into slots indexed by row position; output order always matches input
//! order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;
use uuid::Uuid;

use crate::classifier::DormancyClassifier;
use crate::config::EngineConfig;
use crate::episodes::EpisodeDetector;
use crate::error::ComputeError;
use crate::features::FeatureExtractor;
use crate::matrix::ActivityMatrix;
use crate::scoring::{DecayModel, RfiScorer};
use crate::threshold::ThresholdStrategy;
use crate::types::{
    BatchMetadata, BatchReport, UserDetail, UserError, UserErrorKind, UserProfile,
};
use crate::{ENGINE_NAME, ENGINE_VERSION};

/// Run the engine over a JSON activity matrix (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let report = analyze_matrix(matrix_json, EngineConfig::default())?;
/// ```
pub fn analyze_matrix(matrix_json: &str, config: EngineConfig) -> Result<BatchReport, ComputeError> {
    let engine = DormancyEngine::new(config)?;
    let matrix = ActivityMatrix::parse_json(matrix_json)?;
    engine.run_batch(&matrix)
}

/// Cooperative cancellation flag shared with a running batch.
///
/// Checked before each user computation, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one row, stored at the row's index
enum Outcome {
    Profiled(UserProfile),
    Failed(UserError),
}

/// Configured RFI dormancy engine
pub struct DormancyEngine {
    config: EngineConfig,
    scorer: RfiScorer,
    extractor: FeatureExtractor,
    classifier: DormancyClassifier,
}

impl DormancyEngine {
    /// Create an engine using the strategies named in `config`
    pub fn new(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            scorer: RfiScorer::from_kind(config.decay),
            extractor: FeatureExtractor::new(config.recent_window_days),
            classifier: DormancyClassifier::from_config(&config),
            config,
        })
    }

    /// Create an engine with caller-supplied decay and threshold strategies.
    ///
    /// The `decay` and `threshold` fields of `config` are then informational only.
    pub fn with_strategies(
        config: EngineConfig,
        decay: Box<dyn DecayModel>,
        threshold: Box<dyn ThresholdStrategy>,
    ) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            scorer: RfiScorer::new(decay),
            extractor: FeatureExtractor::new(config.recent_window_days),
            classifier: DormancyClassifier::new(
                threshold,
                config.dormancy_horizon_days,
                config.default_threshold_days,
            ),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full per-user pipeline on a validated 0/1 row
    pub fn profile_row(&self, user_id: &str, row: &[u8]) -> UserDetail {
        // Stage 1: Detect episodes
        let episodes = EpisodeDetector::detect(row);

        // Stage 2: Score recency/relevance
        let scored = self.scorer.score(&episodes);

        // Stage 3: Extract features
        let features = self.extractor.extract(user_id, row, &scored);

        // Stage 4: Classify dormancy
        let label = self.classifier.classify_episodes(&scored);

        debug!(
            "user {user_id}: {} episodes, at_risk={}",
            episodes.len(),
            label.at_risk
        );

        UserDetail {
            profile: UserProfile { features, label },
            rfi_matrix: self.scorer.rfi_matrix(&episodes),
            episodes: scored,
        }
    }

    /// Single-user query
    pub fn profile_user(
        &self,
        matrix: &ActivityMatrix,
        user_id: &str,
    ) -> Result<UserDetail, ComputeError> {
        let index = matrix
            .position(user_id)
            .ok_or_else(|| ComputeError::UserNotFound(user_id.to_string()))?;
        let row = matrix.binary_row(index)?;
        Ok(self.profile_row(user_id, &row))
    }

    /// Profile every user in the matrix
    pub fn run_batch(&self, matrix: &ActivityMatrix) -> Result<BatchReport, ComputeError> {
        self.run_batch_with_cancel(matrix, &CancellationToken::new())
    }

    /// Profile every user, stopping early once `cancel` is set.
    ///
    /// Users not started before cancellation are reported as `cancelled` errors.
    pub fn run_batch_with_cancel(
        &self,
        matrix: &ActivityMatrix,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, ComputeError> {
        info!(
            "profiling {} users over a {}-day window",
            matrix.len(),
            matrix.window_days()
        );

        let outcomes = match self.config.workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| ComputeError::Configuration(e.to_string()))?;
                pool.install(|| self.map_users(matrix, cancel))
            }
            None => self.map_users(matrix, cancel),
        };

        let mut rows = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Profiled(profile) => rows.push(profile),
                Outcome::Failed(error) => errors.push(error),
            }
        }

        let cancelled = errors.iter().any(|e| e.kind == UserErrorKind::Cancelled);
        if cancelled {
            warn!("batch cancelled; {} users profiled", rows.len());
        }
        info!(
            "batch finished: {} profiled, {} rejected",
            rows.len(),
            errors.len()
        );

        Ok(BatchReport {
            metadata: self.metadata(matrix),
            rows,
            errors,
            cancelled,
        })
    }

    fn map_users(&self, matrix: &ActivityMatrix, cancel: &CancellationToken) -> Vec<Outcome> {
        matrix
            .rows()
            .par_iter()
            .enumerate()
            .map(|(index, user)| {
                if cancel.is_cancelled() {
                    return Outcome::Failed(UserError {
                        index,
                        user_id: user.user_id.clone(),
                        kind: UserErrorKind::Cancelled,
                        message: "batch cancelled before this user was processed".to_string(),
                    });
                }

                match matrix.binary_row(index) {
                    Ok(row) => Outcome::Profiled(self.profile_row(&user.user_id, &row).profile),
                    Err(e) => {
                        warn!("rejecting row {index}: {e}");
                        Outcome::Failed(UserError {
                            index,
                            user_id: user.user_id.clone(),
                            kind: UserErrorKind::InputShape,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .collect()
    }

    fn metadata(&self, matrix: &ActivityMatrix) -> BatchMetadata {
        BatchMetadata {
            engine: ENGINE_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            run_id: Uuid::new_v4().to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            window_days: matrix.window_days(),
            start_date: matrix.start_date(),
            end_date: matrix.end_date(),
            total_users: matrix.len(),
            config: self.config.clone(),
        }
    }
}
