//! Error types for the Frontpage service
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions, plus the axum response mapping for
//! handler errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Main error type for Frontpage operations
#[derive(Error, Debug)]
pub enum FrontpageError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Content item not found
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// Request was missing or carried malformed required fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller lacked the internal token or session identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid content ID format
    #[error("Invalid content ID: {0}")]
    InvalidContentId(#[from] uuid::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP request (push delivery) failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Live connection channel is gone (client disconnected)
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

/// Result type alias for Frontpage operations
pub type Result<T> = std::result::Result<T, FrontpageError>;

impl From<libsql::Error> for FrontpageError {
    fn from(err: libsql::Error) -> Self {
        FrontpageError::Database(err.to_string())
    }
}

impl IntoResponse for FrontpageError {
    fn into_response(self) -> Response {
        let status = match &self {
            FrontpageError::Validation(_) | FrontpageError::InvalidContentId(_) => {
                StatusCode::BAD_REQUEST
            }
            FrontpageError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            FrontpageError::ContentNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrontpageError::ContentNotFound("test-id".to_string());
        assert_eq!(err.to_string(), "Content not found: test-id");
    }

    #[test]
    fn test_error_conversion() {
        let uuid_err = uuid::Uuid::parse_str("invalid");
        assert!(uuid_err.is_err());

        let frontpage_err: FrontpageError = uuid_err.unwrap_err().into();
        assert!(matches!(
            frontpage_err,
            FrontpageError::InvalidContentId(_)
        ));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = FrontpageError::Validation("user_id is required".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let err = FrontpageError::Unauthorized("missing internal token".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
