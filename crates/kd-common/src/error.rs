//! Error taxonomy for the incident bundle engine.
//!
//! Errors carry stable numeric codes for machine parsing and a category for
//! grouping. Validation errors are rejected synchronously before any job is
//! created; mid-execution failures are recorded on the job itself rather than
//! propagated to an unrelated caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for incident bundle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request validation errors (window, include set, unknown IDs).
    Validation,
    /// Telemetry source adapter failures.
    Source,
    /// Export job state machine violations.
    Job,
    /// Job/bundle store and artifact I/O failures.
    Storage,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Source => write!(f, "source"),
            ErrorCategory::Job => write!(f, "job"),
            ErrorCategory::Storage => write!(f, "storage"),
        }
    }
}

/// Unified error type for the incident bundle engine.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (10-19)
    #[error("invalid time window: from {from} must precede to {to}")]
    InvalidWindow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("include set is empty: at least one artifact kind is required")]
    EmptyIncludeSet,

    #[error("unknown connection: {connection_id}")]
    UnknownConnection { connection_id: String },

    #[error("unknown namespace: {namespace_id}")]
    UnknownNamespace { namespace_id: String },

    // Source errors (20-29)
    #[error("telemetry source unavailable: {0}")]
    SourceUnavailable(String),

    // Job errors (50-59)
    #[error("destination already claimed by running job: {path}")]
    DestinationConflict { path: String },

    #[error("invalid job state: {job_id} is {status}, {operation} not permitted")]
    InvalidJobState {
        job_id: String,
        status: String,
        operation: String,
    },

    #[error("export job not found: {job_id}")]
    JobNotFound { job_id: String },

    // Storage errors (60-69)
    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Codes are grouped by category:
    /// - 10-19: validation
    /// - 20-29: telemetry source
    /// - 50-59: job state machine
    /// - 60-69: storage and I/O
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidWindow { .. } => 10,
            Error::EmptyIncludeSet => 11,
            Error::UnknownConnection { .. } => 12,
            Error::UnknownNamespace { .. } => 13,
            Error::SourceUnavailable(_) => 20,
            Error::DestinationConflict { .. } => 50,
            Error::InvalidJobState { .. } => 51,
            Error::JobNotFound { .. } => 54,
            Error::StorageFailure(_) => 60,
            Error::Io(_) => 61,
            Error::Json(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidWindow { .. }
            | Error::EmptyIncludeSet
            | Error::UnknownConnection { .. }
            | Error::UnknownNamespace { .. } => ErrorCategory::Validation,

            Error::SourceUnavailable(_) => ErrorCategory::Source,

            Error::DestinationConflict { .. }
            | Error::InvalidJobState { .. }
            | Error::JobNotFound { .. } => ErrorCategory::Job,

            Error::StorageFailure(_) | Error::Io(_) | Error::Json(_) => ErrorCategory::Storage,
        }
    }

    /// Returns whether this error is potentially recoverable by the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Validation: fix the request and retry
            Error::InvalidWindow { .. }
            | Error::EmptyIncludeSet
            | Error::UnknownConnection { .. }
            | Error::UnknownNamespace { .. } => true,

            // Source outages are usually transient
            Error::SourceUnavailable(_) => true,

            // Wait for the running job or pick another destination
            Error::DestinationConflict { .. } => true,
            // Intentional state machine guard
            Error::InvalidJobState { .. } => false,
            // Job is gone
            Error::JobNotFound { .. } => false,

            // I/O is often transient
            Error::StorageFailure(_) | Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Whether the error must be rejected synchronously at the operation
    /// boundary rather than recorded on a job.
    pub fn is_synchronous_rejection(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Job
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_codes() {
        let from = Utc.timestamp_opt(10, 0).unwrap();
        let to = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(Error::InvalidWindow { from, to }.code(), 10);
        assert_eq!(Error::EmptyIncludeSet.code(), 11);
        assert_eq!(Error::SourceUnavailable("down".into()).code(), 20);
        assert_eq!(
            Error::DestinationConflict {
                path: "/tmp/a".into()
            }
            .code(),
            50
        );
        assert_eq!(
            Error::JobNotFound {
                job_id: "job-x".into()
            }
            .code(),
            54
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::EmptyIncludeSet.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::SourceUnavailable("x".into()).category(),
            ErrorCategory::Source
        );
        assert_eq!(
            Error::StorageFailure("disk full".into()).category(),
            ErrorCategory::Storage
        );
    }

    #[test]
    fn test_invalid_job_state_is_not_recoverable() {
        let err = Error::InvalidJobState {
            job_id: "job-1".into(),
            status: "success".into(),
            operation: "resume".into(),
        };
        assert!(!err.is_recoverable());
        assert!(err.is_synchronous_rejection());
    }

    #[test]
    fn test_source_errors_are_not_synchronous() {
        assert!(!Error::SourceUnavailable("x".into()).is_synchronous_rejection());
        assert!(Error::EmptyIncludeSet.is_synchronous_rejection());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::UnknownConnection {
            connection_id: "conn-9".into(),
        };
        assert_eq!(err.to_string(), "unknown connection: conn-9");
    }
}
