//! No-mock export job lifecycle tests.
//!
//! Drives real jobs against a tempdir store and an in-memory telemetry
//! source:
//! - Success path: artifact written, catalog appended, checksum matches the
//!   preview
//! - Synchronous rejection of invalid requests
//! - Destination conflicts between concurrent jobs
//! - Cooperative cancellation at stage boundaries, then resume with a
//!   checksum equal to a fresh export
//! - Source failures recorded on the job, not thrown at callers
//! - Crash recovery via `recover_interrupted`
//!
//! A gate-able source holds the worker inside its first adapter call so the
//! tests can flip the cancel flag deterministically before any stage
//! boundary is crossed.

use chrono::{TimeZone, Utc};
use kd_bundle::{AssembleRequest, BundleReader};
use kd_common::{ArtifactId, ConnectionId, Error, JobId, NamespaceId, TimeWindow};
use kd_export::{ExportConfig, ExportJobManager, ExportStore, IncidentExportJob, JobStatus};
use kd_redact::RedactionProfile;
use kd_telemetry::{
    ArtifactKind, ArtifactPayload, ConnectionDirectory, InMemoryTelemetryStore, IncludeSet,
    LogEvent, MetricSnapshot, RawArtifactRecord, SourceError, TelemetrySource,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const T0: i64 = 1_700_000_000;
const WAIT: Duration = Duration::from_secs(10);

fn ts(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(T0 + secs, 0).unwrap()
}

fn log_record(id: &str, secs: i64) -> RawArtifactRecord {
    RawArtifactRecord {
        id: ArtifactId::from(id),
        connection_id: ConnectionId::from("conn-prod"),
        namespace_id: Some(NamespaceId::new("prod")),
        timestamp: ts(secs),
        payload: ArtifactPayload::Logs(LogEvent {
            level: "warn".into(),
            source: "replication".into(),
            message: format!("replication lag event {}", id),
            extra: BTreeMap::new(),
        }),
        sensitive_fields: Vec::new(),
    }
}

fn metric_record(id: &str, secs: i64) -> RawArtifactRecord {
    RawArtifactRecord {
        id: ArtifactId::from(id),
        connection_id: ConnectionId::from("conn-prod"),
        namespace_id: Some(NamespaceId::new("prod")),
        timestamp: ts(secs),
        payload: ArtifactPayload::Metrics(MetricSnapshot {
            server_host: Some("cache-1.internal".into()),
            metrics: BTreeMap::from([("used_memory_bytes".to_string(), 4096.0)]),
            extra: BTreeMap::new(),
        }),
        sensitive_fields: Vec::new(),
    }
}

fn populated_store() -> InMemoryTelemetryStore {
    let mut store = InMemoryTelemetryStore::new();
    for i in 0..40 {
        store.insert(log_record(&format!("lg-{:03}", i), i));
    }
    for i in 0..10 {
        store.insert(metric_record(&format!("mt-{:03}", i), i * 3));
    }
    store
}

fn request() -> AssembleRequest {
    AssembleRequest {
        window: TimeWindow::new(ts(0), ts(3600)),
        connection_ids: None,
        namespace_id: None,
        includes: IncludeSet::from_kinds([ArtifactKind::Logs, ArtifactKind::Metrics]),
        profile: RedactionProfile::Default,
    }
}

fn manager_over(dir: &TempDir, source: Arc<InMemoryTelemetryStore>) -> ExportJobManager {
    ExportJobManager::new(
        ExportStore::at(dir.path()),
        Arc::clone(&source) as Arc<dyn TelemetrySource>,
        source as Arc<dyn ConnectionDirectory>,
        ExportConfig::default(),
    )
    .expect("manager")
}

/// Telemetry source whose adapter calls block until the gate is released.
/// Lets a test hold a worker before its first stage boundary.
struct GatedSource {
    inner: InMemoryTelemetryStore,
    gate: Mutex<bool>,
    cvar: Condvar,
}

impl GatedSource {
    fn new(inner: InMemoryTelemetryStore) -> Self {
        GatedSource {
            inner,
            gate: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn release(&self) {
        let mut open = self.gate.lock().unwrap();
        *open = true;
        self.cvar.notify_all();
    }

    fn wait_for_release(&self) {
        let mut open = self.gate.lock().unwrap();
        while !*open {
            open = self.cvar.wait(open).unwrap();
        }
    }
}

impl TelemetrySource for GatedSource {
    fn fetch(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<Vec<RawArtifactRecord>, SourceError> {
        self.wait_for_release();
        self.inner.fetch(kind, window, connection_ids, namespace_id)
    }

    fn count(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<u64, SourceError> {
        self.wait_for_release();
        self.inner.count(kind, window, connection_ids, namespace_id)
    }
}

impl ConnectionDirectory for GatedSource {
    fn connection_exists(&self, id: &ConnectionId) -> Result<bool, SourceError> {
        self.inner.connection_exists(id)
    }

    fn namespace_exists(&self, id: &NamespaceId) -> Result<bool, SourceError> {
        self.inner.namespace_exists(id)
    }
}

fn gated_manager(dir: &TempDir) -> (ExportJobManager, Arc<GatedSource>) {
    let gated = Arc::new(GatedSource::new(populated_store()));
    let manager = ExportJobManager::new(
        ExportStore::at(dir.path()),
        Arc::clone(&gated) as Arc<dyn TelemetrySource>,
        Arc::clone(&gated) as Arc<dyn ConnectionDirectory>,
        ExportConfig::default(),
    )
    .expect("manager");
    (manager, gated)
}

/// Source whose fetches always fail, simulating a collaborator store outage.
struct FailingSource {
    inner: InMemoryTelemetryStore,
}

impl TelemetrySource for FailingSource {
    fn fetch(
        &self,
        _kind: ArtifactKind,
        _window: TimeWindow,
        _connection_ids: Option<&[ConnectionId]>,
        _namespace_id: Option<&NamespaceId>,
    ) -> Result<Vec<RawArtifactRecord>, SourceError> {
        Err(SourceError::Unavailable("log store offline".into()))
    }

    fn count(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<u64, SourceError> {
        self.inner.count(kind, window, connection_ids, namespace_id)
    }
}

impl ConnectionDirectory for FailingSource {
    fn connection_exists(&self, id: &ConnectionId) -> Result<bool, SourceError> {
        self.inner.connection_exists(id)
    }

    fn namespace_exists(&self, id: &NamespaceId) -> Result<bool, SourceError> {
        self.inner.namespace_exists(id)
    }
}

// ============================================================================
// Success path
// ============================================================================

#[test]
fn export_succeeds_and_matches_preview() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));

    let preview = manager.preview(&request()).unwrap();
    assert_eq!(preview.counts.logs, 40);
    assert_eq!(preview.counts.metrics, 10);

    let job = manager.start_export(request(), None).unwrap();
    assert_eq!(job.status, JobStatus::Running);

    let finished = manager.wait_for_terminal(&job.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);
    assert_eq!(finished.progress_percent, 100);
    assert!(finished.stage.is_none());
    assert!(finished.destination_path.exists());

    // Catalog entry exists and carries the full checksum.
    let bundles = manager.list_bundles(10, None).unwrap();
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].checksum.starts_with(&preview.checksum_preview));
    assert_eq!(bundles[0].counts.total(), 50);

    // The artifact on disk verifies and agrees with the catalog.
    let mut reader = BundleReader::open(&finished.destination_path).unwrap();
    reader.verify().unwrap();
    assert_eq!(reader.manifest().content_checksum, bundles[0].checksum);
}

#[test]
fn default_destination_lands_in_exports_dir() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));

    let job = manager.start_export(request(), None).unwrap();
    assert!(job
        .destination_path
        .starts_with(manager.store().exports_dir()));

    let finished = manager.wait_for_terminal(&job.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);
}

#[test]
fn progress_is_monotonic_across_status_reads() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));

    let job = manager.start_export(request(), None).unwrap();

    let mut samples = vec![job.progress_percent];
    loop {
        let current = manager.get_job(&job.id).unwrap();
        samples.push(current.progress_percent);
        if current.status.is_terminal() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    for pair in samples.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "progress regressed: {:?}",
            samples
        );
    }
    assert_eq!(*samples.last().unwrap(), 100);
}

// ============================================================================
// Synchronous rejection
// ============================================================================

#[test]
fn invalid_requests_rejected_before_job_creation() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));

    let mut bad_window = request();
    bad_window.window = TimeWindow::new(ts(0), ts(0));
    assert!(matches!(
        manager.start_export(bad_window, None),
        Err(Error::InvalidWindow { .. })
    ));

    let mut no_includes = request();
    no_includes.includes = IncludeSet::from_kinds([]);
    assert!(matches!(
        manager.start_export(no_includes, None),
        Err(Error::EmptyIncludeSet)
    ));

    let mut ghost_connection = request();
    ghost_connection.connection_ids = Some(vec![ConnectionId::from("conn-ghost")]);
    assert!(matches!(
        manager.start_export(ghost_connection, None),
        Err(Error::UnknownConnection { .. })
    ));

    let mut ghost_namespace = request();
    ghost_namespace.namespace_id = Some(NamespaceId::new("ns-ghost"));
    assert!(matches!(
        manager.preview(&ghost_namespace),
        Err(Error::UnknownNamespace { .. })
    ));

    // Nothing was persisted for any rejected request.
    assert!(manager.store().list_jobs().unwrap().is_empty());
}

#[test]
fn status_of_unknown_job_is_not_found() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));
    assert!(matches!(
        manager.get_job(&JobId::new()),
        Err(Error::JobNotFound { .. })
    ));
}

// ============================================================================
// Destination conflicts
// ============================================================================

#[test]
fn second_export_to_same_destination_conflicts_while_running() {
    let dir = TempDir::new().unwrap();
    let (manager, gate) = gated_manager(&dir);
    let destination: PathBuf = dir.path().join("shared.ibundle");

    let first = manager
        .start_export(request(), Some(destination.clone()))
        .unwrap();

    // First job is held inside its first adapter call; second claim fails.
    let conflict = manager.start_export(request(), Some(destination.clone()));
    assert!(matches!(conflict, Err(Error::DestinationConflict { .. })));

    gate.release();
    let finished = manager.wait_for_terminal(&first.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);

    // Claim is released once the first job is terminal.
    let second = manager
        .start_export(request(), Some(destination))
        .unwrap();
    let finished = manager.wait_for_terminal(&second.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);
}

// ============================================================================
// Cancellation and resume
// ============================================================================

fn cancel_held_job(
    manager: &ExportJobManager,
    gate: &GatedSource,
    destination: PathBuf,
) -> IncidentExportJob {
    let job = manager
        .start_export(request(), Some(destination))
        .unwrap();
    // The worker is parked inside its first adapter call; the flag is set
    // before any stage boundary is crossed.
    manager.cancel_job(&job.id).unwrap();
    gate.release();
    let cancelled = manager.wait_for_terminal(&job.id, WAIT).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    cancelled
}

#[test]
fn cancel_then_resume_reaches_success_with_fresh_checksum() {
    let dir = TempDir::new().unwrap();
    let (manager, gate) = gated_manager(&dir);
    let destination = dir.path().join("resumable.ibundle");

    let cancelled = cancel_held_job(&manager, &gate, destination.clone());
    assert!(
        !destination.exists(),
        "cancelled job must not leave output at the destination"
    );

    let resumed = manager.resume_job(&cancelled.id).unwrap();
    assert_eq!(resumed.status, JobStatus::Running);
    assert_eq!(resumed.progress_percent, 0);

    let finished = manager.wait_for_terminal(&resumed.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);

    // The resumed job's checksum equals a fresh export of the same request
    // against the same telemetry.
    let fresh_dir = TempDir::new().unwrap();
    let fresh_manager = manager_over(&fresh_dir, Arc::new(populated_store()));
    let fresh = fresh_manager.start_export(request(), None).unwrap();
    let fresh = fresh_manager.wait_for_terminal(&fresh.id, WAIT).unwrap();
    assert_eq!(fresh.status, JobStatus::Success);

    let resumed_checksum = manager.list_bundles(1, None).unwrap()[0].checksum.clone();
    let fresh_checksum = fresh_manager.list_bundles(1, None).unwrap()[0]
        .checksum
        .clone();
    assert_eq!(resumed_checksum, fresh_checksum);
}

#[test]
fn cancel_of_terminal_job_is_idempotent_noop() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));

    let job = manager.start_export(request(), None).unwrap();
    let finished = manager.wait_for_terminal(&job.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);

    let after_cancel = manager.cancel_job(&job.id).unwrap();
    assert_eq!(after_cancel.status, JobStatus::Success);
    assert_eq!(after_cancel.history.len(), finished.history.len());
    assert_eq!(after_cancel.updated_at, finished.updated_at);
}

#[test]
fn resume_is_rejected_for_success_and_running_jobs() {
    let dir = TempDir::new().unwrap();
    let manager = manager_over(&dir, Arc::new(populated_store()));

    let job = manager.start_export(request(), None).unwrap();
    let finished = manager.wait_for_terminal(&job.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);
    assert!(matches!(
        manager.resume_job(&job.id),
        Err(Error::InvalidJobState { .. })
    ));

    let running_dir = TempDir::new().unwrap();
    let (held_manager, gate) = gated_manager(&running_dir);
    let held = held_manager.start_export(request(), None).unwrap();
    assert!(matches!(
        held_manager.resume_job(&held.id),
        Err(Error::InvalidJobState { .. })
    ));
    gate.release();
    held_manager.wait_for_terminal(&held.id, WAIT).unwrap();
}

#[test]
fn double_cancel_before_release_is_accepted() {
    let dir = TempDir::new().unwrap();
    let (manager, gate) = gated_manager(&dir);

    let job = manager.start_export(request(), None).unwrap();
    manager.cancel_job(&job.id).unwrap();
    manager.cancel_job(&job.id).unwrap();
    gate.release();

    let finished = manager.wait_for_terminal(&job.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Cancelled);
}

// ============================================================================
// Failure path
// ============================================================================

#[test]
fn source_outage_fails_the_job_with_message() {
    let dir = TempDir::new().unwrap();
    let failing = Arc::new(FailingSource {
        inner: populated_store(),
    });
    let manager = ExportJobManager::new(
        ExportStore::at(dir.path()),
        Arc::clone(&failing) as Arc<dyn TelemetrySource>,
        failing as Arc<dyn ConnectionDirectory>,
        ExportConfig::default(),
    )
    .unwrap();

    let job = manager.start_export(request(), None).unwrap();
    let finished = manager.wait_for_terminal(&job.id, WAIT).unwrap();

    assert_eq!(finished.status, JobStatus::Failed);
    let message = finished.error_message.expect("failure reason recorded");
    assert!(message.contains("unavailable"), "message: {}", message);
    assert!(!finished.destination_path.exists());
    assert!(manager.list_bundles(10, None).unwrap().is_empty());
}

// ============================================================================
// Crash recovery
// ============================================================================

#[test]
fn recover_interrupted_then_resume_succeeds() {
    let dir = TempDir::new().unwrap();
    let store = ExportStore::at(dir.path());
    store.ensure_layout().unwrap();

    // Simulate a crash: a job persisted as running with no live driver.
    let mut orphan = IncidentExportJob::new(
        JobId::new(),
        request(),
        store.exports_dir().join("orphan.ibundle"),
    );
    store.create_job(&orphan).unwrap();
    orphan.record_status(JobStatus::Running);
    store.update_job(&orphan).unwrap();

    let manager = manager_over(&dir, Arc::new(populated_store()));
    let recovered = manager.recover_interrupted().unwrap();
    assert_eq!(recovered, vec![orphan.id.clone()]);

    let failed = manager.get_job(&orphan.id).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("interrupted"));

    let resumed = manager.resume_job(&orphan.id).unwrap();
    let finished = manager.wait_for_terminal(&resumed.id, WAIT).unwrap();
    assert_eq!(finished.status, JobStatus::Success);
    assert!(finished.destination_path.exists());
}
