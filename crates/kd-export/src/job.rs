//! Export job record and state machine types.
//!
//! A job is the durable record of one export: its status, current stage,
//! progress, destination, and the request parameters (kept so resume re-runs
//! with identical inputs). Status flips are appended to `history` so the job
//! detail view can show the full lifecycle.

use chrono::{DateTime, Utc};
use kd_bundle::AssembleRequest;
use kd_common::{JobId, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Export job status. `success`, `failed`, and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Stage of a running export. Meaningful only while status is `running`;
/// advances monotonically within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Collecting,
    Redacting,
    Writing,
    Finalizing,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStage::Collecting => "collecting",
            JobStage::Redacting => "redacting",
            JobStage::Writing => "writing",
            JobStage::Finalizing => "finalizing",
        };
        write!(f, "{}", s)
    }
}

/// One entry in the append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<JobStage>,
    pub ts: DateTime<Utc>,
}

/// Durable record of one incident bundle export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentExportJob {
    pub schema_version: String,
    pub id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<JobStage>,
    pub progress_percent: u8,
    pub destination_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The request this job executes. Resume re-runs exactly this.
    pub request: AssembleRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<StatusTransition>,
}

impl IncidentExportJob {
    /// Create a queued job for a validated request.
    pub fn new(id: JobId, request: AssembleRequest, destination_path: PathBuf) -> Self {
        let now = Utc::now();
        IncidentExportJob {
            schema_version: SCHEMA_VERSION.to_string(),
            id,
            status: JobStatus::Queued,
            stage: None,
            progress_percent: 0,
            destination_path,
            error_message: None,
            request,
            created_at: now,
            updated_at: now,
            history: vec![StatusTransition {
                status: JobStatus::Queued,
                stage: None,
                ts: now,
            }],
        }
    }

    /// Append a status flip to the history and update timestamps.
    pub fn record_status(&mut self, status: JobStatus) {
        let now = Utc::now();
        self.status = status;
        if status != JobStatus::Running {
            self.stage = None;
        }
        self.history.push(StatusTransition {
            status,
            stage: self.stage,
            ts: now,
        });
        self.updated_at = now;
    }

    /// Advance the stage within a running job.
    pub fn set_stage(&mut self, stage: JobStage) {
        self.stage = Some(stage);
        self.updated_at = Utc::now();
    }

    /// Raise progress, clamped to `[0, 99]` and never decreasing within a run.
    /// Only [`complete`](Self::complete) reaches 100.
    pub fn raise_progress(&mut self, percent: u8) {
        let clamped = percent.min(99);
        if clamped > self.progress_percent {
            self.progress_percent = clamped;
            self.updated_at = Utc::now();
        }
    }

    /// Terminal success: progress hits 100 atomically with the status flip.
    pub fn complete(&mut self) {
        self.progress_percent = 100;
        self.record_status(JobStatus::Success);
    }

    /// Terminal failure with a recorded reason.
    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.error_message = Some(error_message.into());
        self.record_status(JobStatus::Failed);
    }

    /// Reset for a resumed run: back to `running` with fresh stage/progress.
    /// The request and destination are untouched.
    pub fn reset_for_resume(&mut self) {
        self.error_message = None;
        self.progress_percent = 0;
        self.stage = None;
        self.record_status(JobStatus::Running);
    }

    /// Whether resume is legal from the current status.
    pub fn can_resume(&self) -> bool {
        matches!(self.status, JobStatus::Failed | JobStatus::Cancelled)
    }
}
