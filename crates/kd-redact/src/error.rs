//! Error types for redaction configuration.
//!
//! Redaction itself is total and never errors; only policy file handling can
//! fail.

use thiserror::Error;

/// Errors from redaction policy handling.
#[derive(Error, Debug)]
pub enum RedactionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid redaction policy: {0}")]
    InvalidPolicy(String),
}

/// Result type alias for redaction configuration operations.
pub type Result<T> = std::result::Result<T, RedactionError>;
