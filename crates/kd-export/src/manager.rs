//! Export job manager: the service boundary for incident bundle exports.
//!
//! Owns the job state machine. `start_export` validates synchronously,
//! records the job, and returns as soon as it is `running`; a worker thread
//! drives the stages `collecting → redacting → writing → finalizing` and is
//! the only writer to that job's record. Cancellation is a per-job atomic
//! flag, read (not locked) at stage boundaries. Resume re-runs the persisted
//! request from scratch and never reuses partial output, so a resumed job's
//! checksum equals a fresh export against unchanged telemetry.

use crate::catalog::IncidentBundle;
use crate::config::ExportConfig;
use crate::job::{IncidentExportJob, JobStage, JobStatus};
use crate::store::ExportStore;
use kd_bundle::{AssembleRequest, AssembledBundle, BundleAssembler, BundlePreview, BundleWriter};
use kd_common::{Error, JobId, NamespaceId, Result};
use kd_redact::Redactor;
use kd_telemetry::{ConnectionDirectory, TelemetrySource};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Poll interval for [`ExportJobManager::wait_for_terminal`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// In-process driver bookkeeping: one cancel flag per live job, plus the
/// destination paths currently claimed by non-terminal jobs.
#[derive(Default)]
struct DriverState {
    cancel_flags: HashMap<String, Arc<AtomicBool>>,
    claimed_destinations: HashSet<PathBuf>,
}

fn lock_state(state: &Mutex<DriverState>) -> MutexGuard<'_, DriverState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Service boundary for previewing and exporting incident bundles.
pub struct ExportJobManager {
    store: ExportStore,
    assembler: BundleAssembler,
    directory: Arc<dyn ConnectionDirectory>,
    state: Arc<Mutex<DriverState>>,
}

impl ExportJobManager {
    /// Build a manager over a store, a telemetry source, and a connection
    /// directory.
    pub fn new(
        store: ExportStore,
        source: Arc<dyn TelemetrySource>,
        directory: Arc<dyn ConnectionDirectory>,
        config: ExportConfig,
    ) -> Result<Self> {
        store.ensure_layout()?;
        config
            .policy
            .validate()
            .map_err(|e| Error::StorageFailure(e.to_string()))?;
        let assembler = BundleAssembler::new(source, Redactor::new(config.policy), config.caps);
        Ok(ExportJobManager {
            store,
            assembler,
            directory,
            state: Arc::new(Mutex::new(DriverState::default())),
        })
    }

    pub fn store(&self) -> &ExportStore {
        &self.store
    }

    /// Synchronous, persistence-free preview of what an export would produce.
    pub fn preview(&self, request: &AssembleRequest) -> Result<BundlePreview> {
        self.validate_request(request)?;
        self.assembler.preview(request)
    }

    /// Validate and start an export job. Returns as soon as the job is
    /// recorded as `running`; callers poll [`get_job`](Self::get_job).
    pub fn start_export(
        &self,
        request: AssembleRequest,
        destination: Option<PathBuf>,
    ) -> Result<IncidentExportJob> {
        self.validate_request(&request)?;

        let job_id = JobId::new();
        let destination = destination
            .unwrap_or_else(|| self.store.exports_dir().join(format!("{}.ibundle", job_id)));
        self.claim_destination(&destination)?;

        let created: Result<IncidentExportJob> = (|| {
            let mut job = IncidentExportJob::new(job_id.clone(), request, destination.clone());
            self.store.create_job(&job)?;
            job.record_status(JobStatus::Running);
            self.store.update_job(&job)?;
            Ok(job)
        })();

        match created {
            Ok(job) => {
                info!(
                    job_id = %job.id,
                    destination = %job.destination_path.display(),
                    profile = %job.request.profile,
                    "Export job started"
                );
                self.spawn_driver(job.clone());
                Ok(job)
            }
            Err(err) => {
                lock_state(&self.state)
                    .claimed_destinations
                    .remove(&destination);
                Err(err)
            }
        }
    }

    /// Request cancellation of a job.
    ///
    /// Always accepted: a terminal job is returned unchanged (idempotent
    /// no-op); a running job's driver observes the flag at the next stage
    /// boundary.
    pub fn cancel_job(&self, id: &JobId) -> Result<IncidentExportJob> {
        let job = self.store.load_job(id)?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        let flag = lock_state(&self.state).cancel_flags.get(&id.0).cloned();
        match flag {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                info!(job_id = %id, "Cancellation requested");
                self.store.load_job(id)
            }
            None => {
                // No live driver in this process (crashed or restarted):
                // settle the record directly.
                let mut job = job;
                job.record_status(JobStatus::Cancelled);
                self.store.update_job(&job)?;
                info!(job_id = %id, "Cancelled job with no live driver");
                Ok(job)
            }
        }
    }

    /// Resume a `cancelled` or `failed` job: re-claim its destination and
    /// re-run the persisted request from scratch.
    pub fn resume_job(&self, id: &JobId) -> Result<IncidentExportJob> {
        let mut job = self.store.load_job(id)?;
        if !job.can_resume() {
            return Err(Error::InvalidJobState {
                job_id: id.to_string(),
                status: job.status.to_string(),
                operation: "resume".to_string(),
            });
        }
        self.claim_destination(&job.destination_path)?;

        let updated: Result<()> = (|| {
            job.reset_for_resume();
            self.store.update_job(&job)
        })();

        match updated {
            Ok(()) => {
                info!(job_id = %job.id, "Export job resumed");
                self.spawn_driver(job.clone());
                Ok(job)
            }
            Err(err) => {
                lock_state(&self.state)
                    .claimed_destinations
                    .remove(&job.destination_path);
                Err(err)
            }
        }
    }

    /// Read a job's current record.
    pub fn get_job(&self, id: &JobId) -> Result<IncidentExportJob> {
        self.store.load_job(id)
    }

    /// List completed bundles, most-recent-first.
    pub fn list_bundles(
        &self,
        limit: usize,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<Vec<IncidentBundle>> {
        self.store.list_bundles(limit, namespace_id)
    }

    /// Fail jobs left `queued`/`running` by a previous process.
    ///
    /// Call once at service startup, before accepting new work. Recovered
    /// jobs become `failed` and flow through the ordinary resume path.
    pub fn recover_interrupted(&self) -> Result<Vec<JobId>> {
        let mut recovered = Vec::new();
        for mut job in self.store.list_jobs()? {
            if job.status.is_terminal() {
                continue;
            }
            if lock_state(&self.state)
                .cancel_flags
                .contains_key(&job.id.0)
            {
                continue; // live driver in this process
            }
            job.fail("interrupted by process shutdown");
            self.store.update_job(&job)?;
            warn!(job_id = %job.id, "Recovered interrupted job as failed");
            recovered.push(job.id.clone());
        }
        Ok(recovered)
    }

    /// Poll until the job reaches a terminal status or the timeout elapses.
    /// Returns the last observed record either way.
    pub fn wait_for_terminal(&self, id: &JobId, timeout: Duration) -> Result<IncidentExportJob> {
        let deadline = Instant::now() + timeout;
        loop {
            let job = self.store.load_job(id)?;
            if job.status.is_terminal() || Instant::now() >= deadline {
                return Ok(job);
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn validate_request(&self, request: &AssembleRequest) -> Result<()> {
        request.validate()?;
        if let Some(ids) = &request.connection_ids {
            for id in ids {
                if !self.directory.connection_exists(id).map_err(Error::from)? {
                    return Err(Error::UnknownConnection {
                        connection_id: id.to_string(),
                    });
                }
            }
        }
        if let Some(ns) = &request.namespace_id {
            if !self.directory.namespace_exists(ns).map_err(Error::from)? {
                return Err(Error::UnknownNamespace {
                    namespace_id: ns.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Claim a destination path for one job: rejects if another non-terminal
    /// job (in-process or persisted) already targets it.
    fn claim_destination(&self, path: &Path) -> Result<()> {
        let mut state = lock_state(&self.state);
        if state.claimed_destinations.contains(path) {
            return Err(Error::DestinationConflict {
                path: path.display().to_string(),
            });
        }
        for job in self.store.list_jobs()? {
            if job.destination_path.as_path() == path && !job.status.is_terminal() {
                return Err(Error::DestinationConflict {
                    path: path.display().to_string(),
                });
            }
        }
        state.claimed_destinations.insert(path.to_path_buf());
        Ok(())
    }

    fn spawn_driver(&self, job: IncidentExportJob) {
        let cancel = Arc::new(AtomicBool::new(false));
        lock_state(&self.state)
            .cancel_flags
            .insert(job.id.0.clone(), Arc::clone(&cancel));

        let worker = JobWorker {
            store: self.store.clone(),
            assembler: self.assembler.clone(),
            state: Arc::clone(&self.state),
        };
        std::thread::spawn(move || worker.drive(job, cancel));
    }
}

enum RunOutcome {
    Completed,
    Cancelled,
}

/// Per-job worker: exactly one of these mutates a job's record, on its own
/// thread.
struct JobWorker {
    store: ExportStore,
    assembler: BundleAssembler,
    state: Arc<Mutex<DriverState>>,
}

impl JobWorker {
    fn drive(self, mut job: IncidentExportJob, cancel: Arc<AtomicBool>) {
        let id = job.id.clone();
        let destination = job.destination_path.clone();

        if let Err(err) = self.run_stages(&mut job, &cancel) {
            let reached_writing = job.stage.is_some_and(|s| s >= JobStage::Writing);
            if reached_writing {
                // Partial artifact bytes are discarded where feasible.
                let _ = std::fs::remove_file(&destination);
            }
            job.fail(err.to_string());
            if let Err(store_err) = self.store.update_job(&job) {
                error!(job_id = %id, error = %store_err, "Failed to persist job failure");
            }
            warn!(job_id = %id, error = %err, "Export job failed");
        }

        let mut state = lock_state(&self.state);
        state.cancel_flags.remove(&id.0);
        state.claimed_destinations.remove(&destination);
    }

    /// Drive the stages strictly in order, checking the cancel flag at each
    /// stage boundary.
    fn run_stages(&self, job: &mut IncidentExportJob, cancel: &AtomicBool) -> Result<RunOutcome> {
        // Count-only pass for the progress estimate: collect and redact each
        // touch every admitted record once.
        let estimate = self.assembler.count_estimate(&job.request)?;
        let total_work = estimate.saturating_mul(2);
        let mut processed = 0u64;

        if cancel.load(Ordering::Relaxed) {
            return self.finish_cancelled(job, false);
        }
        job.set_stage(JobStage::Collecting);
        self.store.update_job(job)?;
        let collected = self.assembler.collect(&job.request)?;
        processed += collected.total() as u64;
        job.raise_progress(progress_pct(processed, total_work));
        self.store.update_job(job)?;

        if cancel.load(Ordering::Relaxed) {
            return self.finish_cancelled(job, false);
        }
        job.set_stage(JobStage::Redacting);
        self.store.update_job(job)?;
        let bundle = self.assembler.redact(&job.request, collected)?;
        processed += bundle.counts.total() as u64;
        job.raise_progress(progress_pct(processed, total_work));
        self.store.update_job(job)?;

        if cancel.load(Ordering::Relaxed) {
            return self.finish_cancelled(job, false);
        }
        job.set_stage(JobStage::Writing);
        self.store.update_job(job)?;
        self.write_artifact(&bundle, &job.destination_path)?;

        if cancel.load(Ordering::Relaxed) {
            // The artifact landed but the job will not finalize: a cancelled
            // job's output is not valid and must not enter the catalog.
            return self.finish_cancelled(job, true);
        }
        job.set_stage(JobStage::Finalizing);
        self.store.update_job(job)?;
        let record = IncidentBundle::new(
            job.request.profile,
            bundle.counts,
            bundle.truncated,
            bundle.checksum.clone(),
            job.destination_path.clone(),
            job.request.namespace_id.clone(),
            job.id.clone(),
        );
        self.store.append_bundle(&record)?;
        job.complete();
        self.store.update_job(job)?;

        info!(
            job_id = %job.id,
            bundle_id = %record.id,
            checksum = %record.checksum,
            records = record.counts.total(),
            "Export job completed"
        );
        Ok(RunOutcome::Completed)
    }

    fn finish_cancelled(
        &self,
        job: &mut IncidentExportJob,
        remove_artifact: bool,
    ) -> Result<RunOutcome> {
        if remove_artifact {
            let _ = std::fs::remove_file(&job.destination_path);
        }
        job.record_status(JobStatus::Cancelled);
        self.store.update_job(job)?;
        info!(job_id = %job.id, "Export job cancelled at stage boundary");
        Ok(RunOutcome::Cancelled)
    }

    /// Artifact writes go through a temp file plus rename; a crash mid-write
    /// leaves no file at the destination.
    fn write_artifact(&self, bundle: &AssembledBundle, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let (bytes, _manifest) = BundleWriter::new(bundle)
            .write_to_vec()
            .map_err(Error::from)?;
        let file_name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("artifact.ibundle");
        let tmp = destination.with_file_name(format!("{}.tmp", file_name));
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, destination)?;
        Ok(())
    }
}

fn progress_pct(processed: u64, total_work: u64) -> u8 {
    if total_work == 0 {
        return 0;
    }
    ((processed.saturating_mul(99)) / total_work).min(99) as u8
}
