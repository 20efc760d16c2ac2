//! RFI Dormancy - per-user inactivity profiling and 6-month dormancy prediction
//!
//! The engine turns a user × day binary activity matrix into one row of features per
//! user through a deterministic pipeline: episode detection → recency/relevance
//! scoring → feature extraction → personalized dormancy classification.
//!
//! ## Modules
//!
//! - **Pipeline**: per-user pipeline, single-user query and the parallel batch runner
//! - **Scoring**: pluggable relevance decay and the per-user RFI summary matrix
//! - **Classifier**: personalized thresholds from each user's own episode history

pub mod classifier;
pub mod config;
pub mod encoder;
pub mod episodes;
pub mod error;
pub mod features;
pub mod matrix;
pub mod pipeline;
pub mod scoring;
pub mod stats;
pub mod threshold;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::DormancyClassifier;
pub use config::{DecayKind, EngineConfig, ThresholdKind};
pub use encoder::{ReportEncoder, TableFormat, OUTPUT_COLUMNS};
pub use episodes::EpisodeDetector;
pub use error::ComputeError;
pub use features::FeatureExtractor;
pub use matrix::{ActivityMatrix, UserActivity};
pub use pipeline::{analyze_matrix, CancellationToken, DormancyEngine};
pub use scoring::{DecayModel, RfiScorer};
pub use threshold::ThresholdStrategy;
pub use types::{BatchReport, DormancyLabel, FeatureVector, UserDetail, UserProfile};

/// Engine version recorded in every batch report
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name recorded in every batch report
pub const ENGINE_NAME: &str = "rfi-dormancy";
