//! Export configuration.
//!
//! Per-kind caps and the redaction policy, loadable from a JSON file with
//! serde defaults for everything omitted.

use kd_bundle::KindCaps;
use kd_redact::RedactionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the export job manager.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportConfig {
    /// Per-kind record caps for bundle assembly.
    #[serde(default)]
    pub caps: KindCaps,

    /// Redaction policy (thresholds and per-class overrides).
    #[serde(default)]
    pub policy: RedactionPolicy,

    /// Override for the store data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl ExportConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> kd_common::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExportConfig = serde_json::from_str(&content)?;
        config
            .policy
            .validate()
            .map_err(|e| kd_common::Error::StorageFailure(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> kd_common::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
