//! Custom error types for the cleaning and feature engineering stages.
//!
//! Errors are serializable so the HTTP layer can return them verbatim as
//! `{code, message}` objects.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for dataset processing.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A dataset file is missing or could not be parsed.
    #[error("Cannot access dataset '{path}': {reason}")]
    DataAccess { path: String, reason: String },

    /// A column required by an operation is absent.
    #[error("Column '{column}' is required by {operation} but was not found")]
    MissingColumn { column: String, operation: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for API consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataAccess { .. } => "DATA_ACCESS",
            Self::MissingColumn { .. } => "SCHEMA_MISMATCH",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error stems from the dataset shape rather than the environment.
    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            Self::MissingColumn { .. } => true,
            Self::WithContext { source, .. } => source.is_schema_mismatch(),
            _ => false,
        }
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = ProcessingError::MissingColumn {
            column: "Price".to_string(),
            operation: "train/test split".to_string(),
        };
        assert_eq!(err.error_code(), "SCHEMA_MISMATCH");
        assert_eq!(
            ProcessingError::InvalidConfig("x".to_string()).error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = ProcessingError::DataAccess {
            path: "data/raw.csv".to_string(),
            reason: "not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("DATA_ACCESS"));
        assert!(json.contains("data/raw.csv"));
    }

    #[test]
    fn test_with_context_preserves_code() {
        let error = ProcessingError::MissingColumn {
            column: "Price".to_string(),
            operation: "split".to_string(),
        }
        .with_context("While preparing training data");
        assert!(error.to_string().contains("While preparing training data"));
        assert_eq!(error.error_code(), "SCHEMA_MISMATCH");
        assert!(error.is_schema_mismatch());
    }
}
