//! Shared types for the kvdesk incident-diagnostics core.
//!
//! This crate provides the identifier newtypes, the service error taxonomy,
//! and the time-window primitive used across the telemetry, redaction,
//! bundle, and export crates.

pub mod error;
pub mod id;
pub mod time;

pub use error::{Error, ErrorCategory, Result};
pub use id::{ArtifactId, BundleId, ConnectionId, JobId, NamespaceId};
pub use time::TimeWindow;

/// Schema version for persisted job and catalog records.
pub const SCHEMA_VERSION: &str = "1.0.0";
