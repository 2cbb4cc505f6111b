//! Incident bundle assembly and archive handling for kvdesk.
//!
//! A bundle is a point-in-time, redacted, checksum-verified snapshot of
//! operational telemetry across a time window and one or more monitored
//! connections. This crate owns the assembly pipeline and the on-disk
//! artifact format; the export job machinery lives in `kd-export`.
//!
//! # Bundle Format
//!
//! Bundles are ZIP archives containing:
//! - `manifest.json`: metadata, per-kind record ID lists, file checksums,
//!   content checksum
//! - `artifacts/<kind>.jsonl`: one canonical redacted record per line, in
//!   manifest order
//!
//! # Integrity contract
//!
//! The content checksum is a SHA-256 over the manifest's canonical subset
//! followed by every record's canonical bytes in manifest order. Assembling
//! the same window/includes/profile against unchanged telemetry reproduces
//! an identical checksum; the preview exposes a prefix of the same digest so
//! a human can cross-check a preview against the eventual export.

pub mod assemble;
pub mod error;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use assemble::{
    AssembleRequest, AssembledBundle, AssembledRecord, BundleAssembler, BundleCounts,
    BundlePreview, KindCaps, CHECKSUM_PREVIEW_LEN,
};
pub use error::{BundleError, Result};
pub use manifest::{BundleManifest, FileEntry, BUNDLE_SCHEMA_VERSION, MANIFEST_FILE_NAME};
pub use reader::BundleReader;
pub use writer::BundleWriter;
