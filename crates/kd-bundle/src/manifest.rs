//! Bundle manifest types and canonical serialization.
//!
//! The manifest is the source of truth for a bundle's contents: per-kind
//! record ID lists ordered by `(timestamp, id)` ascending, the request
//! parameters that produced them, and file checksums for the archive.
//! The ID ordering is an invariant: it determines checksum determinism.

use chrono::{DateTime, Utc};
use kd_common::{ArtifactId, TimeWindow};
use kd_redact::RedactionProfile;
use kd_telemetry::ArtifactKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current bundle schema version.
pub const BUNDLE_SCHEMA_VERSION: &str = "1.0.0";

/// Manifest file name within the bundle.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Bundle manifest containing per-kind ID lists and file checksums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle format version.
    pub bundle_version: String,

    /// When the bundle was assembled. Excluded from the canonical subset.
    pub created_at: DateTime<Utc>,

    /// Redaction profile applied to every record.
    pub redaction_profile: RedactionProfile,

    /// Time window the bundle covers.
    pub window: TimeWindow,

    /// Whether any kind hit its per-kind cap.
    pub truncated: bool,

    /// Timeline event IDs, ordered by `(timestamp, id)` ascending.
    pub timeline_event_ids: Vec<ArtifactId>,

    /// Log event IDs, same ordering.
    pub log_event_ids: Vec<ArtifactId>,

    /// Diagnostic event IDs, same ordering.
    pub diagnostic_event_ids: Vec<ArtifactId>,

    /// Metric snapshot IDs, same ordering.
    pub metric_snapshot_ids: Vec<ArtifactId>,

    /// Content checksum over the canonical serialization (manifest subset +
    /// record bytes in manifest order). Excluded from the canonical subset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_checksum: String,

    /// Files included in the archive, with checksums. Filled by the writer;
    /// excluded from the canonical subset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
}

impl BundleManifest {
    /// Create an empty manifest for a request.
    pub fn new(profile: RedactionProfile, window: TimeWindow) -> Self {
        Self {
            bundle_version: BUNDLE_SCHEMA_VERSION.to_string(),
            created_at: Utc::now(),
            redaction_profile: profile,
            window,
            truncated: false,
            timeline_event_ids: Vec::new(),
            log_event_ids: Vec::new(),
            diagnostic_event_ids: Vec::new(),
            metric_snapshot_ids: Vec::new(),
            content_checksum: String::new(),
            files: Vec::new(),
        }
    }

    /// The ID list for one kind.
    pub fn ids_for(&self, kind: ArtifactKind) -> &[ArtifactId] {
        match kind {
            ArtifactKind::Timeline => &self.timeline_event_ids,
            ArtifactKind::Logs => &self.log_event_ids,
            ArtifactKind::Diagnostics => &self.diagnostic_event_ids,
            ArtifactKind::Metrics => &self.metric_snapshot_ids,
        }
    }

    /// Replace the ID list for one kind.
    pub fn set_ids(&mut self, kind: ArtifactKind, ids: Vec<ArtifactId>) {
        match kind {
            ArtifactKind::Timeline => self.timeline_event_ids = ids,
            ArtifactKind::Logs => self.log_event_ids = ids,
            ArtifactKind::Diagnostics => self.diagnostic_event_ids = ids,
            ArtifactKind::Metrics => self.metric_snapshot_ids = ids,
        }
    }

    /// Record count for one kind.
    pub fn count_for(&self, kind: ArtifactKind) -> usize {
        self.ids_for(kind).len()
    }

    /// Total records across all kinds.
    pub fn total_records(&self) -> usize {
        ArtifactKind::ALL.iter().map(|k| self.count_for(*k)).sum()
    }

    /// Add a file entry (writer only).
    pub fn add_file(&mut self, entry: FileEntry) {
        self.files.push(entry);
    }

    /// Find a file by path.
    pub fn find_file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Canonical serialization of the checksum-stable subset.
    ///
    /// Volatile metadata (`created_at`, `content_checksum`, `files`) is
    /// excluded so re-assembling the same request against unchanged
    /// telemetry reproduces identical bytes. Field order is fixed by the
    /// serializer's sorted map keys.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let canonical = serde_json::json!({
            "bundle_version": self.bundle_version,
            "redaction_profile": self.redaction_profile.to_string(),
            "window": self.window,
            "truncated": self.truncated,
            "timeline_event_ids": self.timeline_event_ids,
            "log_event_ids": self.log_event_ids,
            "diagnostic_event_ids": self.diagnostic_event_ids,
            "metric_snapshot_ids": self.metric_snapshot_ids,
        });
        serde_json::to_vec(&canonical)
    }

    /// Validate the manifest structure.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bundle_version != BUNDLE_SCHEMA_VERSION {
            return Err(crate::BundleError::UnsupportedVersion {
                version: self.bundle_version.clone(),
                supported: BUNDLE_SCHEMA_VERSION.to_string(),
            });
        }
        for file in &self.files {
            if file.path.is_empty() {
                return Err(crate::BundleError::CorruptedManifest(
                    "file entry has empty path".to_string(),
                ));
            }
            if file.sha256.len() != 64 {
                return Err(crate::BundleError::CorruptedManifest(format!(
                    "file '{}' has invalid checksum length",
                    file.path
                )));
            }
        }
        Ok(())
    }

    /// Serialize to JSON with consistent formatting.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// File entry in the manifest with checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path within the bundle (relative).
    pub path: String,

    /// SHA-256 checksum (64 hex characters).
    pub sha256: String,

    /// Size in bytes.
    pub bytes: u64,

    /// MIME type (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileEntry {
    /// Create a new file entry.
    pub fn new(path: impl Into<String>, sha256: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            sha256: sha256.into(),
            bytes,
            mime_type: None,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Compute SHA-256 checksum of data.
    pub fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Verify the checksum against data.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute_checksum(data) == self.sha256
    }
}
