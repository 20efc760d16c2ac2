//! Error types for the RFI dormancy engine

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    /// A single user's row violates the input contract (wrong length, non-binary value,
    /// empty or duplicated user id). Batches record this per user and keep going.
    #[error("Invalid activity row for user '{user_id}': {reason}")]
    InputShape { user_id: String, reason: String },

    #[error("Invalid engine configuration: {0}")]
    Configuration(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid activity matrix: {0}")]
    MatrixError(String),

    #[error("Failed to parse activity matrix: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Batch cancelled before all users were processed")]
    Cancelled,
}

impl ComputeError {
    pub(crate) fn input_shape(user_id: &str, reason: impl Into<String>) -> Self {
        ComputeError::InputShape {
            user_id: user_id.to_string(),
            reason: reason.into(),
        }
    }
}
