//! Error types for the lhp-learning crate.
//!
//! [`LearningError`] is returned by every fallible operation in the crate:
//! encoding, fitting, persistence, prediction and evaluation.
//!
//! # Example
//!
//! ```no_run
//! use lhp_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     TrainingConfig::builder().cv_folds(5).build()
//! }
//! ```

use lhp_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for lhp-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration or hyperparameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The target column was not found in the training frame.
    #[error("Target column '{0}' not found")]
    TargetNotFound(String),

    /// Too few samples for the requested number of folds.
    ///
    /// Raised by k-fold splitting and fatal for the whole training run.
    #[error("Cannot split {n_samples} samples into {n_folds} folds")]
    InsufficientSamples {
        /// Number of samples available.
        n_samples: usize,
        /// Number of folds requested.
        n_folds: usize,
    },

    /// A persisted model or its feature manifest could not be loaded.
    #[error("Model '{name}' is unavailable: {reason}")]
    ModelUnavailable {
        /// Model name, e.g. `random_forest`.
        name: String,
        /// Why loading failed.
        reason: String,
    },

    /// `predict` was called on a model that was never fitted.
    #[error("Model is not fitted")]
    NotFitted,

    /// Feature matrix and target (or model) dimensions disagree.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What the operation expected.
        expected: String,
        /// What it received.
        actual: String,
    },

    /// Fitting failed, e.g. on a singular system.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// An input record could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Model artifact or manifest (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error while reading frames.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error raised by the processing stage.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl LearningError {
    /// Get error code for API consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::TargetNotFound(_) => "SCHEMA_MISMATCH",
            Self::InsufficientSamples { .. } => "INSUFFICIENT_SAMPLES",
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::NotFitted => "NOT_FITTED",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Processing(e) => e.error_code(),
        }
    }

    /// Shorthand for [`LearningError::ModelUnavailable`].
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_samples_message() {
        let err = LearningError::InsufficientSamples {
            n_samples: 3,
            n_folds: 5,
        };
        assert_eq!(err.to_string(), "Cannot split 3 samples into 5 folds");
        assert_eq!(err.error_code(), "INSUFFICIENT_SAMPLES");
    }

    #[test]
    fn test_processing_error_code_passes_through() {
        let err: LearningError = ProcessingError::MissingColumn {
            column: "Price".to_string(),
            operation: "train/test split".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "SCHEMA_MISMATCH");
    }

    #[test]
    fn test_serialize_code_and_message() {
        let err = LearningError::unavailable("svr", "manifest missing");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MODEL_UNAVAILABLE");
        assert_eq!(json["message"], "Model 'svr' is unavailable: manifest missing");
    }
}
