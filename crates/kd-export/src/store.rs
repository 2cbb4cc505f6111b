//! Durable job and bundle persistence.
//!
//! Layout under the data root (`KVDESK_DATA` override, then the platform
//! data dir):
//!
//! ```text
//! <root>/jobs/<job-id>.json        export job records
//! <root>/bundles/<bundle-id>.json  completed-bundle catalog
//! <root>/exports/                  default artifact destination dir
//! ```
//!
//! Writes go through a temp file plus rename so a crash never leaves a
//! half-written record. A job in a terminal status only accepts the resume
//! transition back to `running`.

use crate::catalog::IncidentBundle;
use crate::job::IncidentExportJob;
use kd_common::{Error, JobId, NamespaceId, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ENV_DATA_DIR: &str = "KVDESK_DATA";
const DIR_NAME: &str = "kvdesk";

const JOBS_DIR: &str = "jobs";
const BUNDLES_DIR: &str = "bundles";
const EXPORTS_DIR: &str = "exports";

/// File-backed store for job records and the bundle catalog.
#[derive(Debug, Clone)]
pub struct ExportStore {
    root: PathBuf,
}

impl ExportStore {
    /// Resolve the store root from the environment.
    pub fn from_env() -> Result<Self> {
        let root = match std::env::var_os(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    Error::StorageFailure(format!(
                        "failed to resolve data dir (set {} or XDG_DATA_HOME)",
                        ENV_DATA_DIR
                    ))
                })?
                .join(DIR_NAME),
        };
        Ok(Self::at(root))
    }

    /// Open a store at an explicit root.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        ExportStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default destination directory for exported artifacts.
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    /// Create the canonical subdirectories.
    pub fn ensure_layout(&self) -> Result<()> {
        for rel in [JOBS_DIR, BUNDLES_DIR, EXPORTS_DIR] {
            std::fs::create_dir_all(self.root.join(rel))?;
        }
        Ok(())
    }

    fn job_path(&self, id: &JobId) -> PathBuf {
        self.root.join(JOBS_DIR).join(format!("{}.json", id))
    }

    fn bundle_path(&self, id: &kd_common::BundleId) -> PathBuf {
        self.root.join(BUNDLES_DIR).join(format!("{}.json", id))
    }

    /// Persist a newly created job.
    pub fn create_job(&self, job: &IncidentExportJob) -> Result<()> {
        self.ensure_layout()?;
        let path = self.job_path(&job.id);
        if path.exists() {
            return Err(Error::StorageFailure(format!(
                "job record already exists: {}",
                job.id
            )));
        }
        write_json_atomic(&path, job)?;
        debug!(job_id = %job.id, "Job record created");
        Ok(())
    }

    /// Load a job by ID.
    pub fn load_job(&self, id: &JobId) -> Result<IncidentExportJob> {
        let path = self.job_path(id);
        if !path.exists() {
            return Err(Error::JobNotFound {
                job_id: id.to_string(),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist an updated job record.
    ///
    /// A job already in a terminal status only accepts the explicit resume
    /// transition back to `running`.
    pub fn update_job(&self, job: &IncidentExportJob) -> Result<()> {
        let current = self.load_job(&job.id)?;
        if current.status.is_terminal() && job.status != crate::job::JobStatus::Running {
            return Err(Error::InvalidJobState {
                job_id: job.id.to_string(),
                status: current.status.to_string(),
                operation: "update".to_string(),
            });
        }
        write_json_atomic(&self.job_path(&job.id), job)?;
        Ok(())
    }

    /// Load every job record. Unparseable files are skipped with a warning.
    pub fn list_jobs(&self) -> Result<Vec<IncidentExportJob>> {
        let dir = self.root.join(JOBS_DIR);
        let mut jobs = Vec::new();
        if !dir.exists() {
            return Ok(jobs);
        }
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|s| Ok(serde_json::from_str::<IncidentExportJob>(&s)?))
            {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable job record");
                }
            }
        }
        Ok(jobs)
    }

    /// Append a completed-bundle catalog record.
    pub fn append_bundle(&self, bundle: &IncidentBundle) -> Result<()> {
        self.ensure_layout()?;
        write_json_atomic(&self.bundle_path(&bundle.id), bundle)?;
        debug!(bundle_id = %bundle.id, checksum = %bundle.checksum, "Bundle catalog record appended");
        Ok(())
    }

    /// List catalog entries, most-recent-first, bounded by `limit`, with an
    /// optional namespace filter.
    pub fn list_bundles(
        &self,
        limit: usize,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<Vec<IncidentBundle>> {
        let dir = self.root.join(BUNDLES_DIR);
        let mut bundles: Vec<IncidentBundle> = Vec::new();
        if !dir.exists() {
            return Ok(bundles);
        }
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|s| Ok(serde_json::from_str::<IncidentBundle>(&s)?))
            {
                Ok(bundle) => {
                    if let Some(ns) = namespace_id {
                        if bundle.namespace_id.as_ref() != Some(ns) {
                            continue;
                        }
                    }
                    bundles.push(bundle);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable catalog record");
                }
            }
        }
        bundles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bundles.truncate(limit);
        Ok(bundles)
    }
}

/// Write JSON to a temp file in the target directory, then rename over the
/// destination.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
