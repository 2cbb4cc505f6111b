//! Read contracts consumed by the bundle engine.
//!
//! Adapters are owned by the collaborator stores (timeline, log, diagnostic,
//! metrics). The bundle engine only requires these traits: time-bounded,
//! filtered, `(timestamp, id)`-ordered, restartable reads.

use crate::record::{ArtifactKind, RawArtifactRecord};
use kd_common::{ConnectionId, NamespaceId, TimeWindow};
use thiserror::Error;

/// Errors surfaced by a telemetry source adapter.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The underlying store is unreachable or failed mid-read.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<SourceError> for kd_common::Error {
    fn from(err: SourceError) -> Self {
        kd_common::Error::SourceUnavailable(err.to_string())
    }
}

/// Read-only query interface over one or more artifact stores.
///
/// Contract: results are ordered by `(timestamp, id)` ascending, finite, and
/// restartable: calling again with the same arguments yields the same
/// logical result set as of call time. Telemetry is append-mostly but not
/// assumed frozen; determinism guarantees hold only while the underlying
/// store is unchanged.
pub trait TelemetrySource: Send + Sync {
    /// Fetch all records of `kind` inside `window`, optionally filtered to a
    /// connection set and/or a namespace.
    fn fetch(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<Vec<RawArtifactRecord>, SourceError>;

    /// Count-only variant of [`fetch`](TelemetrySource::fetch), used for the
    /// upfront progress estimate before committing to full collection.
    fn count(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<u64, SourceError> {
        Ok(self.fetch(kind, window, connection_ids, namespace_id)?.len() as u64)
    }
}

/// Identity resolution for connections and namespaces.
///
/// Owned by the connection-profile subsystem; the bundle engine uses it to
/// reject requests naming unknown IDs before any job is created.
pub trait ConnectionDirectory: Send + Sync {
    fn connection_exists(&self, id: &ConnectionId) -> Result<bool, SourceError>;

    fn namespace_exists(&self, id: &NamespaceId) -> Result<bool, SourceError>;
}
