//! Identifier newtypes for connections, namespaces, artifacts, jobs, and bundles.
//!
//! Connection and namespace IDs are assigned by the connection-profile
//! subsystem and treated as opaque strings here. Job and bundle IDs are
//! generated locally with a date prefix and a short base32 suffix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a monitored connection profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        ConnectionId(id.into())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        ConnectionId(id.to_string())
    }
}

/// Identifier of a namespace (logical grouping of connections).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(pub String);

impl NamespaceId {
    pub fn new(id: impl Into<String>) -> Self {
        NamespaceId(id.into())
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NamespaceId {
    fn from(id: &str) -> Self {
        NamespaceId(id.to_string())
    }
}

/// Identifier of a single telemetry artifact record.
///
/// Artifact IDs are assigned by the producing store and are stable across
/// repeated fetches; manifests reference them without re-exposing content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        ArtifactId(id.into())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        ArtifactId(id.to_string())
    }
}

/// Export job ID.
///
/// Format: `job-YYYYMMDD-HHMMSS-XXXX`
/// Example: `job-20260806-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job ID.
    pub fn new() -> Self {
        JobId(generate_prefixed_id("job"))
    }

    /// Parse an existing job ID string.
    pub fn parse(s: &str) -> Option<Self> {
        parse_prefixed_id(s, "job").map(JobId)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incident bundle ID.
///
/// Format: `ib-YYYYMMDD-HHMMSS-XXXX`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub String);

impl BundleId {
    /// Generate a new bundle ID.
    pub fn new() -> Self {
        BundleId(generate_prefixed_id("ib"))
    }

    /// Parse an existing bundle ID string.
    pub fn parse(s: &str) -> Option<Self> {
        parse_prefixed_id(s, "ib").map(BundleId)
    }
}

impl Default for BundleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_prefixed_id(prefix: &str) -> String {
    let now = chrono::Utc::now();
    format!(
        "{}-{}-{}-{}",
        prefix,
        now.format("%Y%m%d"),
        now.format("%H%M%S"),
        generate_base32_suffix()
    )
}

fn parse_prefixed_id(s: &str, prefix: &str) -> Option<String> {
    let rest = s.strip_prefix(prefix)?.strip_prefix('-')?;
    // rest = YYYYMMDD-HHMMSS-XXXX
    let mut parts = rest.split('-');
    let date = parts.next()?;
    let time = parts.next()?;
    let suffix = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if time.len() != 6 || !time.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if suffix.len() != 4 || !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
        return None;
    }
    Some(s.to_string())
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32);
    value &= 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(4);
    for shift in [15_u32, 10, 5, 0] {
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}
