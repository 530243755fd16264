//! Error types for NeuroNest.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system. Every variant maps to a stable
//! machine-readable code and an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: max {max_size} bytes")]
    FileTooLarge { max_size: usize },

    // External provider errors
    #[error("Embedding generation failed: {0}")]
    Augmentation(String),

    #[error("Summary generation failed: {0}")]
    Summarization(String),

    // Internal encoding errors
    #[error("Embedding serialization failed: {0}")]
    Serialization(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Attachment storage error: {0}")]
    Storage(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401
            Self::Unauthenticated | Self::InvalidToken => StatusCode::UNAUTHORIZED,

            // 404
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 409
            Self::AlreadyExists(_) => StatusCode::CONFLICT,

            // 400
            Self::Validation(_) => StatusCode::BAD_REQUEST,

            // 413
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 502
            Self::Augmentation(_) | Self::Summarization(_) => StatusCode::BAD_GATEWAY,

            // 500
            Self::Serialization(_)
            | Self::Database(_)
            | Self::Storage(_)
            | Self::Internal(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::Augmentation(_) => "AUGMENTATION_ERROR",
            Self::Summarization(_) => "SUMMARIZATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Database(_) => "PERSISTENCE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Human-readable message safe to show to API clients.
    ///
    /// Persistence failures never echo the driver message (it may contain
    /// query text); that text only goes to `details` in debug form.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Database operation failed".to_string(),
            Self::Augmentation(_) => "Embedding generation failed".to_string(),
            Self::Summarization(_) => "Summary generation failed".to_string(),
            Self::Serialization(_) => "Embedding serialization failed".to_string(),
            Self::Storage(_) => "Attachment storage failed".to_string(),
            Self::Internal(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Optional debug detail string for failures caused by a collaborator.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Augmentation(msg)
            | Self::Summarization(msg)
            | Self::Serialization(msg)
            | Self::Storage(msg) => Some(msg.clone()),
            Self::Database(e) => Some(database_detail(e)),
            _ => None,
        }
    }
}

/// Short description of a sqlx error without statement text.
fn database_detail(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => format!("database error code {}", code),
            None => "database error".to_string(),
        },
        sqlx::Error::RowNotFound => "row not found".to_string(),
        sqlx::Error::PoolTimedOut => "connection pool timed out".to_string(),
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        sqlx::Error::Io(_) => "database I/O failure".to_string(),
        _ => "database failure".to_string(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.public_message();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = self.details() {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
