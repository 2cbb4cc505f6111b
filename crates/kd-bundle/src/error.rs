//! Error types for bundle archive operations.

use thiserror::Error;

/// Errors that can occur reading or writing bundle archives.
#[derive(Error, Debug)]
pub enum BundleError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Per-file checksum verification failed
    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Content checksum verification failed
    #[error("content checksum mismatch: expected {expected}, got {actual}")]
    ContentChecksumMismatch { expected: String, actual: String },

    /// Missing required file in bundle
    #[error("missing required file: {0}")]
    MissingFile(String),

    /// Unknown or unsupported bundle version
    #[error("unsupported bundle version: {version} (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    /// Corrupted manifest
    #[error("corrupted manifest: {0}")]
    CorruptedManifest(String),
}

impl From<BundleError> for kd_common::Error {
    fn from(err: BundleError) -> Self {
        kd_common::Error::StorageFailure(err.to_string())
    }
}

/// Result type alias for bundle archive operations.
pub type Result<T> = std::result::Result<T, BundleError>;
