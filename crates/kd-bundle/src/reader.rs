//! Bundle archive reader with integrity verification.
//!
//! Re-opens an exported bundle, parses the manifest, and verifies both the
//! per-file checksums and the content checksum before any record is trusted.

use crate::manifest::{BundleManifest, MANIFEST_FILE_NAME};
use crate::writer::BundleWriter;
use crate::{BundleError, Result};
use kd_redact::RedactedArtifactRecord;
use kd_telemetry::ArtifactKind;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Reader for incident bundle archives.
pub struct BundleReader<R: Read + Seek = File> {
    archive: ZipArchive<R>,
    manifest: BundleManifest,
}

impl BundleReader<File> {
    /// Open a bundle file and parse its manifest.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_archive(ZipArchive::new(file)?)
    }
}

impl BundleReader<Cursor<Vec<u8>>> {
    /// Open a bundle held in memory. Bundles may come from untrusted
    /// sources; parsing must fail cleanly, never panic.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_archive(ZipArchive::new(Cursor::new(bytes))?)
    }
}

impl<R: Read + Seek> BundleReader<R> {
    fn from_archive(mut archive: ZipArchive<R>) -> Result<Self> {
        let manifest_json = {
            let mut entry = archive
                .by_name(MANIFEST_FILE_NAME)
                .map_err(|_| BundleError::MissingFile(MANIFEST_FILE_NAME.to_string()))?;
            let mut json = String::new();
            entry.read_to_string(&mut json)?;
            json
        };
        let manifest = BundleManifest::from_json(&manifest_json)?;
        manifest.validate()?;

        Ok(BundleReader { archive, manifest })
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// Read a raw file from the archive.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut entry = self
            .archive
            .by_name(path)
            .map_err(|_| BundleError::MissingFile(path.to_string()))?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read and parse one kind's records.
    ///
    /// Returns an empty vector when the manifest lists no records for the
    /// kind (the writer emits no file in that case).
    pub fn read_kind(&mut self, kind: ArtifactKind) -> Result<Vec<RedactedArtifactRecord>> {
        if self.manifest.count_for(kind) == 0 {
            return Ok(Vec::new());
        }
        let data = self.read_file(&BundleWriter::artifact_path(kind))?;
        let mut records = Vec::with_capacity(self.manifest.count_for(kind));
        for line in data.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_slice(line)?);
        }
        Ok(records)
    }

    /// Verify per-file checksums and the content checksum.
    pub fn verify(&mut self) -> Result<()> {
        // Per-file checksums from the manifest listing.
        let entries = self.manifest.files.clone();
        for entry in &entries {
            let data = self.read_file(&entry.path)?;
            let actual = crate::FileEntry::compute_checksum(&data);
            if actual != entry.sha256 {
                return Err(BundleError::ChecksumMismatch {
                    path: entry.path.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }

        // Content checksum: manifest canonical subset + record lines in
        // manifest order.
        if self.manifest.content_checksum.is_empty() {
            return Err(BundleError::CorruptedManifest(
                "content_checksum is empty".to_string(),
            ));
        }
        let mut hasher = Sha256::new();
        hasher.update(self.manifest.canonical_bytes()?);
        for kind in ArtifactKind::ALL {
            if self.manifest.count_for(kind) == 0 {
                continue;
            }
            let data = self.read_file(&BundleWriter::artifact_path(kind))?;
            for line in data.split(|b| *b == b'\n') {
                if line.is_empty() {
                    continue;
                }
                hasher.update(line);
            }
        }
        let actual = hex::encode(hasher.finalize());
        if actual != self.manifest.content_checksum {
            return Err(BundleError::ContentChecksumMismatch {
                expected: self.manifest.content_checksum.clone(),
                actual,
            });
        }

        Ok(())
    }
}
