//! Error types for the Governance Decision Engine.
//!
//! Defines a unified error type that maps cleanly to HTTP responses and
//! to per-failure-class CLI exit codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for engine operations.
#[derive(Debug, Error)]
pub enum GovernError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Ingestion of '{document}' failed: {message}")]
    Ingestion { document: String, message: String },

    #[error("Index build failed: {}", .failures.join("; "))]
    Build { failures: Vec<String> },

    #[error("Index load failed: {0}")]
    IndexLoad(String),

    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    #[error("Judgment capability error: {0}")]
    Judgment(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GovernError {
    /// Process exit code for the CLI, one per failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            GovernError::Ingestion { .. } => 2,
            GovernError::Build { .. } => 3,
            GovernError::IndexLoad(_) => 4,
            _ => 1,
        }
    }
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for GovernError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            GovernError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            GovernError::Ingestion { document, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INGESTION_FAILURE",
                format!("Ingestion of '{}' failed", document),
                Some(message.clone()),
            ),
            GovernError::Build { failures } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "BUILD_FAILURE",
                "Index build failed".to_string(),
                Some(failures.join("; ")),
            ),
            GovernError::IndexLoad(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "INDEX_LOAD_FAILURE",
                "Index snapshot unavailable".to_string(),
                Some(msg.clone()),
            ),
            GovernError::AuditWrite(msg) => {
                // An evaluation without an audit trail is an incident, not a footnote
                tracing::error!(error = %msg, "Audit write failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUDIT_WRITE_FAILURE",
                    "Evaluation could not be recorded".to_string(),
                    None,
                )
            }
            GovernError::Judgment(msg) => (
                StatusCode::BAD_GATEWAY,
                "JUDGMENT_FAILURE",
                "Judgment capability error".to_string(),
                Some(msg.clone()),
            ),
            GovernError::Database(e) => {
                // Log the actual error but don't expose internals
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            GovernError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Configuration error".to_string(),
                Some(msg.clone()),
            ),
            GovernError::Serialization(e) => (
                StatusCode::BAD_REQUEST,
                "SERIALIZATION_ERROR",
                "Failed to process request/response".to_string(),
                Some(e.to_string()),
            ),
            GovernError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for engine operations.
pub type GovernResult<T> = Result<T, GovernError>;
