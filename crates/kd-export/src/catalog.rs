//! Completed-bundle catalog entries.

use chrono::{DateTime, Utc};
use kd_bundle::BundleCounts;
use kd_common::{BundleId, JobId, NamespaceId, SCHEMA_VERSION};
use kd_redact::RedactionProfile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Catalog record for a successfully exported bundle.
///
/// Created only on the `success` transition of an export job, immutable
/// afterwards. Not the same entity as the job: a job row is retained for
/// status inspection whether or not it ever produced a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentBundle {
    pub schema_version: String,
    pub id: BundleId,
    pub created_at: DateTime<Utc>,
    pub redaction_profile: RedactionProfile,
    pub counts: BundleCounts,
    pub truncated: bool,
    /// Full content checksum of the artifact (64 hex chars).
    pub checksum: String,
    pub destination_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<NamespaceId>,
    /// The job that produced this bundle.
    pub job_id: JobId,
}

impl IncidentBundle {
    pub fn new(
        redaction_profile: RedactionProfile,
        counts: BundleCounts,
        truncated: bool,
        checksum: String,
        destination_path: PathBuf,
        namespace_id: Option<NamespaceId>,
        job_id: JobId,
    ) -> Self {
        IncidentBundle {
            schema_version: SCHEMA_VERSION.to_string(),
            id: BundleId::new(),
            created_at: Utc::now(),
            redaction_profile,
            counts,
            truncated,
            checksum,
            destination_path,
            namespace_id,
            job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_serde_roundtrip() {
        let entry = IncidentBundle::new(
            RedactionProfile::Strict,
            BundleCounts {
                timeline: 3,
                logs: 0,
                diagnostics: 1,
                metrics: 2,
            },
            true,
            "ab".repeat(32),
            PathBuf::from("/tmp/incident.ibundle"),
            Some(NamespaceId::new("prod")),
            JobId::new(),
        );

        let json = serde_json::to_string(&entry).unwrap();
        let back: IncidentBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.counts, entry.counts);
        assert_eq!(back.checksum, entry.checksum);
        assert_eq!(back.namespace_id, entry.namespace_id);
    }
}
