//! kvdesk telemetry record model and source adapter contracts.
//!
//! This crate provides:
//! - The four artifact record kinds (timeline, logs, diagnostics, metrics)
//!   with well-known fields plus a typed extra-attributes map
//! - The read-only `TelemetrySource` contract the bundle engine consumes
//! - The `ConnectionDirectory` contract for identity resolution
//! - An in-memory store implementing both, used by the CLI and tests
//!
//! Telemetry is produced and persisted by collaborator subsystems (timeline
//! store, log store, diagnostic store, metrics store); this crate only
//! defines what the incident bundle engine reads.

pub mod memory;
pub mod record;
pub mod source;

pub use memory::InMemoryTelemetryStore;
pub use record::{
    ArtifactKind, ArtifactPayload, DiagnosticEvent, IncludeSet, LogEvent, MetricSnapshot,
    RawArtifactRecord, TimelineEvent,
};
pub use source::{ConnectionDirectory, SourceError, TelemetrySource};

/// Schema version for telemetry records.
pub const SCHEMA_VERSION: &str = "1.0.0";
