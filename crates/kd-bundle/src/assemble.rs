//! Bundle assembly: fetch, cap, redact, manifest, checksum.
//!
//! The assembler is used both for preview (no persistence) and as the
//! collecting/redacting stages of an export job. It owns the determinism
//! contract: identical requests against unchanged telemetry produce
//! identical manifests and checksums.

use crate::manifest::BundleManifest;
use kd_common::{ConnectionId, NamespaceId, TimeWindow};
use kd_redact::{RedactionProfile, Redactor};
use kd_telemetry::{ArtifactKind, IncludeSet, RawArtifactRecord, TelemetrySource};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Length of the checksum preview exposed to humans (hex chars).
pub const CHECKSUM_PREVIEW_LEN: usize = 16;

/// Default per-kind record cap.
pub const DEFAULT_KIND_CAP: usize = 5_000;

/// Request to assemble (or export) an incident bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembleRequest {
    pub window: TimeWindow,
    /// Restrict to these connections; `None` means all monitored connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_ids: Option<Vec<ConnectionId>>,
    /// Restrict to one namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<NamespaceId>,
    pub includes: IncludeSet,
    pub profile: RedactionProfile,
}

impl AssembleRequest {
    /// Synchronous validation of window and include set.
    pub fn validate(&self) -> kd_common::Result<()> {
        self.window.validate()?;
        self.includes.validate()?;
        Ok(())
    }
}

/// Per-kind admission caps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KindCaps {
    pub timeline: usize,
    pub logs: usize,
    pub diagnostics: usize,
    pub metrics: usize,
}

impl KindCaps {
    /// The same cap for every kind.
    pub fn uniform(cap: usize) -> Self {
        KindCaps {
            timeline: cap,
            logs: cap,
            diagnostics: cap,
            metrics: cap,
        }
    }

    pub fn cap_for(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Timeline => self.timeline,
            ArtifactKind::Logs => self.logs,
            ArtifactKind::Diagnostics => self.diagnostics,
            ArtifactKind::Metrics => self.metrics,
        }
    }
}

impl Default for KindCaps {
    fn default() -> Self {
        Self::uniform(DEFAULT_KIND_CAP)
    }
}

/// Per-kind record counts of an assembled bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCounts {
    pub timeline: usize,
    pub logs: usize,
    pub diagnostics: usize,
    pub metrics: usize,
}

impl BundleCounts {
    pub fn count_for(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Timeline => self.timeline,
            ArtifactKind::Logs => self.logs,
            ArtifactKind::Diagnostics => self.diagnostics,
            ArtifactKind::Metrics => self.metrics,
        }
    }

    fn set(&mut self, kind: ArtifactKind, count: usize) {
        match kind {
            ArtifactKind::Timeline => self.timeline = count,
            ArtifactKind::Logs => self.logs = count,
            ArtifactKind::Diagnostics => self.diagnostics = count,
            ArtifactKind::Metrics => self.metrics = count,
        }
    }

    pub fn total(&self) -> usize {
        self.timeline + self.logs + self.diagnostics + self.metrics
    }
}

/// Ephemeral preview of what an export would produce. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlePreview {
    pub counts: BundleCounts,
    pub estimated_size_bytes: u64,
    /// Stable prefix of the full content checksum.
    pub checksum_preview: String,
    pub truncated: bool,
    pub manifest: BundleManifest,
}

/// Raw records admitted during the collecting stage, before redaction.
#[derive(Debug)]
pub struct CollectedArtifacts {
    records: BTreeMap<ArtifactKind, Vec<RawArtifactRecord>>,
    truncated: bool,
}

impl CollectedArtifacts {
    /// Total admitted records across kinds.
    pub fn total(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// One redacted record plus its canonical bytes.
#[derive(Debug, Clone)]
pub struct AssembledRecord {
    pub record: kd_redact::RedactedArtifactRecord,
    /// Canonical serialization; one JSONL line in the artifact, and one
    /// segment of the content checksum input.
    pub canonical: Vec<u8>,
}

/// A fully assembled bundle, ready to preview or write.
#[derive(Debug)]
pub struct AssembledBundle {
    pub manifest: BundleManifest,
    /// Redacted records per kind, in manifest order.
    pub records: BTreeMap<ArtifactKind, Vec<AssembledRecord>>,
    pub counts: BundleCounts,
    pub truncated: bool,
    pub estimated_size_bytes: u64,
    /// Full content checksum (64 hex chars). Also stored on the manifest.
    pub checksum: String,
}

impl AssembledBundle {
    /// Project the ephemeral preview from this bundle.
    pub fn preview(&self) -> BundlePreview {
        BundlePreview {
            counts: self.counts,
            estimated_size_bytes: self.estimated_size_bytes,
            checksum_preview: self.checksum.chars().take(CHECKSUM_PREVIEW_LEN).collect(),
            truncated: self.truncated,
            manifest: self.manifest.clone(),
        }
    }
}

/// The bundle assembler: pulls from the telemetry source, applies redaction,
/// enforces per-kind caps, and computes the manifest and content checksum.
#[derive(Clone)]
pub struct BundleAssembler {
    source: Arc<dyn TelemetrySource>,
    redactor: Redactor,
    caps: KindCaps,
}

impl BundleAssembler {
    pub fn new(source: Arc<dyn TelemetrySource>, redactor: Redactor, caps: KindCaps) -> Self {
        BundleAssembler {
            source,
            redactor,
            caps,
        }
    }

    /// Count-only pass over the adapters: how many records the collecting
    /// stage would admit (capped per kind). Used for progress estimates.
    pub fn count_estimate(&self, request: &AssembleRequest) -> kd_common::Result<u64> {
        request.validate()?;
        let mut total = 0u64;
        for kind in request.includes.iter() {
            let available = self.source.count(
                kind,
                request.window,
                request.connection_ids.as_deref(),
                request.namespace_id.as_ref(),
            )?;
            total += available.min(self.caps.cap_for(kind) as u64);
        }
        Ok(total)
    }

    /// Collecting stage: fetch and admit up to the per-kind cap,
    /// oldest-first. Truncation is a deterministic prefix, never a subsample.
    pub fn collect(&self, request: &AssembleRequest) -> kd_common::Result<CollectedArtifacts> {
        request.validate()?;

        let mut records = BTreeMap::new();
        let mut truncated = false;

        for kind in request.includes.iter() {
            let mut fetched = self.source.fetch(
                kind,
                request.window,
                request.connection_ids.as_deref(),
                request.namespace_id.as_ref(),
            )?;
            // Manifest ordering is part of the checksum contract; sort
            // explicitly rather than trusting adapter order.
            fetched.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

            let cap = self.caps.cap_for(kind);
            if fetched.len() > cap {
                debug!(
                    kind = %kind,
                    available = fetched.len(),
                    cap,
                    "Per-kind cap reached, truncating oldest-first"
                );
                fetched.truncate(cap);
                truncated = true;
            }
            records.insert(kind, fetched);
        }

        Ok(CollectedArtifacts { records, truncated })
    }

    /// Redacting stage: sanitize every admitted record, build the manifest,
    /// and compute the content checksum.
    pub fn redact(
        &self,
        request: &AssembleRequest,
        collected: CollectedArtifacts,
    ) -> kd_common::Result<AssembledBundle> {
        let mut manifest = BundleManifest::new(request.profile, request.window);
        manifest.truncated = collected.truncated;

        let mut records: BTreeMap<ArtifactKind, Vec<AssembledRecord>> = BTreeMap::new();
        let mut counts = BundleCounts::default();
        let mut estimated_size_bytes = 0u64;

        for (kind, raw_records) in &collected.records {
            let mut assembled = Vec::with_capacity(raw_records.len());
            for raw in raw_records {
                let redacted = self.redactor.redact_record(raw, request.profile);
                let canonical = redacted.canonical_bytes()?;
                estimated_size_bytes += canonical.len() as u64;
                assembled.push(AssembledRecord {
                    record: redacted,
                    canonical,
                });
            }
            let ids = assembled.iter().map(|a| a.record.id.clone()).collect();
            manifest.set_ids(*kind, ids);
            counts.set(*kind, assembled.len());
            records.insert(*kind, assembled);
        }

        let checksum = content_checksum(&manifest, &records)?;
        manifest.content_checksum = checksum.clone();

        debug!(
            records = counts.total(),
            truncated = collected.truncated,
            checksum = %checksum,
            "Bundle assembled"
        );

        Ok(AssembledBundle {
            manifest,
            records,
            counts,
            truncated: collected.truncated,
            estimated_size_bytes,
            checksum,
        })
    }

    /// Full assembly: collecting + redacting in one call.
    pub fn assemble(&self, request: &AssembleRequest) -> kd_common::Result<AssembledBundle> {
        let collected = self.collect(request)?;
        self.redact(request, collected)
    }

    /// Preview: same pipeline, no persistence.
    pub fn preview(&self, request: &AssembleRequest) -> kd_common::Result<BundlePreview> {
        Ok(self.assemble(request)?.preview())
    }
}

/// SHA-256 over the manifest canonical subset followed by every record's
/// canonical bytes in manifest order.
fn content_checksum(
    manifest: &BundleManifest,
    records: &BTreeMap<ArtifactKind, Vec<AssembledRecord>>,
) -> kd_common::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(manifest.canonical_bytes()?);
    for kind in ArtifactKind::ALL {
        if let Some(assembled) = records.get(&kind) {
            for record in assembled {
                hasher.update(&record.canonical);
            }
        }
    }
    Ok(hex::encode(hasher.finalize()))
}
