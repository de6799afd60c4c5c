//! API error type and its JSON response.
//!
//! Every error is rendered as `{"error": <text>, "status": <tag>}` with a
//! matching HTTP status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lhp_learning::LearningError;
use lhp_processing::ProcessingError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{message}")]
    BadRequest {
        message: String,
        status: &'static str,
    },

    #[error("{message}")]
    NotFound {
        message: String,
        status: &'static str,
    },

    /// No model could be loaded.
    #[error("{0}")]
    Unavailable(String),

    /// The processed dataset lacks a column a route depends on.
    #[error("{0} column not found in data")]
    MissingColumn(&'static str),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Learning(#[from] LearningError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, status: &'static str) -> Self {
        Self::BadRequest {
            message: message.into(),
            status,
        }
    }

    pub fn not_found(message: impl Into<String>, status: &'static str) -> Self {
        Self::NotFound {
            message: message.into(),
            status,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Learning(LearningError::Encoding(_)) => StatusCode::BAD_REQUEST,
            Self::Learning(LearningError::ModelUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Learning(_)
            | Self::Processing(_)
            | Self::MissingColumn(_)
            | Self::Internal(_)
            | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable tag for the `status` field.
    fn status_tag(&self) -> &'static str {
        match self {
            Self::BadRequest { status, .. } | Self::NotFound { status, .. } => *status,
            Self::Unavailable(_) => "model_unavailable",
            Self::MissingColumn(_) => "missing_column",
            Self::Learning(LearningError::Encoding(_)) => "invalid_input",
            Self::Learning(LearningError::ModelUnavailable { .. }) => "model_unavailable",
            _ => "error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(detail = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": self.status_tag(),
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("No input data provided", "missing_data").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LearningError::unavailable("svr", "missing")).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(LearningError::NotFitted).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(
            ApiError::not_found("no data", "no_data").status_tag(),
            "no_data"
        );
        assert_eq!(
            ApiError::from(LearningError::Encoding("bad".into())).status_tag(),
            "invalid_input"
        );
        assert_eq!(
            ApiError::MissingColumn("Parish").status_tag(),
            "missing_column"
        );
        assert_eq!(ApiError::Internal("boom".into()).status_tag(), "error");
    }
}
