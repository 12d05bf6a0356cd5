//! Error types for Pestwise services
//!
//! Provides the error taxonomy of the answer pipeline:
//! - Parse errors for malformed knowledge frames (skipped, never fatal)
//! - Generation failures (timeout, unavailable, invalid output), all of
//!   which are funneled into a canned fallback answer
//! - Cache corruption (treated as a miss)
//! - Configuration errors (fatal at startup only)
//!
//! A knowledge lookup miss is a normal outcome and has no variant here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    ParseError,

    // Resource errors (4xxx)
    NotFound,

    // External service errors (8xxx)
    UpstreamError,
    GenerationTimeout,
    GenerationUnavailable,
    GenerationInvalidOutput,
    CacheCorruption,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::ParseError => 1002,

            ErrorCode::NotFound => 4001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::GenerationTimeout => 8002,
            ErrorCode::GenerationUnavailable => 8003,
            ErrorCode::GenerationInvalidOutput => 8004,
            ErrorCode::CacheCorruption => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Malformed frame at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    #[error("Generation timed out after {timeout_ms}ms")]
    GenerationTimeout { timeout_ms: u64 },

    #[error("Generation backend unavailable: {message}")]
    GenerationUnavailable { message: String },

    #[error("Generation returned unusable output: {reason}")]
    GenerationInvalidOutput { reason: String },

    #[error("Cache entry corrupted: {message}")]
    CacheCorruption { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Parse { .. } => ErrorCode::ParseError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::GenerationTimeout { .. } => ErrorCode::GenerationTimeout,
            AppError::GenerationUnavailable { .. } => ErrorCode::GenerationUnavailable,
            AppError::GenerationInvalidOutput { .. } => ErrorCode::GenerationInvalidOutput,
            AppError::CacheCorruption { .. } => ErrorCode::CacheCorruption,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } | AppError::ConfigSource(_) => {
                ErrorCode::ConfigurationError
            }
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Parse { .. } => StatusCode::BAD_REQUEST,

            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::ConfigSource(_)
            | AppError::Serialization(_)
            | AppError::CacheCorruption { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::GenerationInvalidOutput { .. } | AppError::HttpClient(_) => {
                StatusCode::BAD_GATEWAY
            }

            AppError::GenerationUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            AppError::GenerationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Timeout, unreachable backend or unusable output
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            AppError::GenerationTimeout { .. }
                | AppError::GenerationUnavailable { .. }
                | AppError::GenerationInvalidOutput { .. }
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::GenerationTimeout { timeout_ms: 500 };
        assert_eq!(err.code(), ErrorCode::GenerationTimeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code().as_code(), 8002);
    }

    #[test]
    fn test_generation_failures_grouped() {
        assert!(AppError::GenerationTimeout { timeout_ms: 1 }.is_generation_failure());
        assert!(AppError::GenerationUnavailable { message: "down".into() }.is_generation_failure());
        assert!(AppError::GenerationInvalidOutput { reason: "empty".into() }.is_generation_failure());
        assert!(!AppError::CacheCorruption { message: "bad".into() }.is_generation_failure());
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "query too long".into(),
            field: Some("query".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_parse_error_message_has_line() {
        let err = AppError::Parse {
            line: 7,
            message: "missing ')'".into(),
        };
        assert!(err.to_string().contains("line 7"));
    }
}
