//! Error types for CampusCandid services
//!
//! Provides:
//! - Distinct error types for the request failure taxonomy
//! - HTTP status code mapping (400 for caller mistakes, 500 for dependencies)
//! - Transient/permanent classification for retries
//! - The `{ "error": ... }` response body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned to callers for every server-side failure
pub const GENERIC_SERVER_ERROR: &str = "Internal server error";

/// Error codes for machine-readable error identification in logs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller errors (1xxx)
    InvalidInput,
    UnresolvedEntity,

    // Dependency errors (8xxx)
    GraphStoreError,
    LanguageModelError,
    MalformedModelOutput,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 1001,
            ErrorCode::UnresolvedEntity => 1002,

            ErrorCode::GraphStoreError => 8001,
            ErrorCode::LanguageModelError => 8002,
            ErrorCode::MalformedModelOutput => 8003,
            ErrorCode::UpstreamError => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Caller errors
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("No college recognized in the query")]
    UnresolvedEntity,

    // Dependency errors
    #[error("Graph store error: {message}")]
    GraphStore { message: String, transient: bool },

    #[error("Language model error: {message}")]
    LanguageModel { message: String, transient: bool },

    #[error("Malformed language model output: {message}")]
    MalformedModelOutput { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput { .. } => ErrorCode::InvalidInput,
            AppError::UnresolvedEntity => ErrorCode::UnresolvedEntity,
            AppError::GraphStore { .. } => ErrorCode::GraphStoreError,
            AppError::LanguageModel { .. } => ErrorCode::LanguageModelError,
            AppError::MalformedModelOutput { .. } => ErrorCode::MalformedModelOutput,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// Graph store and language model failures deliberately share the same 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } | AppError::UnresolvedEntity => StatusCode::BAD_REQUEST,

            AppError::GraphStore { .. }
            | AppError::LanguageModel { .. }
            | AppError::MalformedModelOutput { .. }
            | AppError::HttpClient(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether retrying the failed call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::GraphStore { transient, .. } | AppError::LanguageModel { transient, .. } => {
                *transient
            }
            AppError::HttpClient(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| is_transient_status(s.as_u16()))
            }
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        if self.is_server_error() {
            GENERIC_SERVER_ERROR.to_string()
        } else {
            self.to_string()
        }
    }
}

/// HTTP statuses worth retrying: throttling and server-side failures
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Error body returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Diagnostics stay in the log; callers only see the public message
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                numeric_code = code.as_code(),
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

        let body = ErrorResponse {
            error: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
