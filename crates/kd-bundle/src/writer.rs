//! Bundle archive writer.
//!
//! Writes an assembled bundle as a ZIP archive: `manifest.json` first, then
//! `artifacts/<kind>.jsonl` in fixed kind order. File ordering and record
//! line ordering are deterministic.

use crate::assemble::AssembledBundle;
use crate::manifest::{BundleManifest, FileEntry, MANIFEST_FILE_NAME};
use crate::Result;
use kd_telemetry::ArtifactKind;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::info;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

const JSONL_MIME: &str = "application/x-ndjson";

/// Writer for incident bundle archives.
pub struct BundleWriter<'a> {
    bundle: &'a AssembledBundle,
}

impl<'a> BundleWriter<'a> {
    pub fn new(bundle: &'a AssembledBundle) -> Self {
        BundleWriter { bundle }
    }

    /// Relative archive path for one kind's records.
    pub fn artifact_path(kind: ArtifactKind) -> String {
        format!("artifacts/{}.jsonl", kind)
    }

    /// Write the bundle to a file.
    pub fn write(&self, path: &Path) -> Result<BundleManifest> {
        let (bytes, manifest) = self.write_to_vec()?;
        std::fs::write(path, &bytes)?;

        info!(
            path = %path.display(),
            records = manifest.total_records(),
            bytes = bytes.len(),
            profile = %manifest.redaction_profile,
            "Bundle written"
        );

        Ok(manifest)
    }

    /// Write the bundle to a byte vector (for in-memory use and for callers
    /// that stage writes through a temp file).
    pub fn write_to_vec(&self) -> Result<(Vec<u8>, BundleManifest)> {
        let mut manifest = self.bundle.manifest.clone();
        manifest.files = Vec::new();

        // Serialize each kind's records as JSONL, in manifest order.
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        for kind in ArtifactKind::ALL {
            let Some(records) = self.bundle.records.get(&kind) else {
                continue;
            };
            if records.is_empty() {
                continue;
            }
            let mut data = Vec::new();
            for record in records {
                data.extend_from_slice(&record.canonical);
                data.push(b'\n');
            }
            let path = Self::artifact_path(kind);
            let entry = FileEntry::new(
                &path,
                FileEntry::compute_checksum(&data),
                data.len() as u64,
            )
            .with_mime_type(JSONL_MIME);
            manifest.add_file(entry);
            files.push((path, data));
        }

        let manifest_json = manifest.to_json()?;

        // Create the ZIP in memory
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);

            let options: FileOptions<'_, ()> = FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644);

            // Write manifest first
            zip.start_file(MANIFEST_FILE_NAME, options)?;
            zip.write_all(manifest_json.as_bytes())?;

            // Write artifact files in fixed kind order
            for (file_path, data) in &files {
                zip.start_file(file_path.as_str(), options)?;
                zip.write_all(data)?;
            }

            zip.finish()?;
        }

        Ok((buffer.into_inner(), manifest))
    }
}
