//! Artifact record types for the four telemetry kinds.
//!
//! Each kind has a closed set of well-known fields plus an explicitly typed
//! `extra` attributes map (`BTreeMap` so serialization order is stable).
//! Records are immutable once returned by an adapter; redaction derives
//! copies and never mutates source data.

use chrono::{DateTime, Utc};
use kd_common::{ArtifactId, ConnectionId, NamespaceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The four artifact kinds a bundle can include.
///
/// The declaration order is the canonical iteration order everywhere a
/// bundle walks its kinds; manifest and checksum determinism depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Timeline,
    Logs,
    Diagnostics,
    Metrics,
}

impl ArtifactKind {
    /// All kinds in canonical order.
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Timeline,
        ArtifactKind::Logs,
        ArtifactKind::Diagnostics,
        ArtifactKind::Metrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Timeline => "timeline",
            ArtifactKind::Logs => "logs",
            ArtifactKind::Diagnostics => "diagnostics",
            ArtifactKind::Metrics => "metrics",
        }
    }

    /// Parse a kind from a string.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "timeline" => Some(ArtifactKind::Timeline),
            "logs" => Some(ArtifactKind::Logs),
            "diagnostics" => Some(ArtifactKind::Diagnostics),
            "metrics" => Some(ArtifactKind::Metrics),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Non-empty subset of artifact kinds to include in a bundle.
///
/// Iteration always follows [`ArtifactKind::ALL`] order regardless of how
/// the set was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncludeSet(BTreeSet<ArtifactKind>);

impl IncludeSet {
    /// Build an include set from any iterator of kinds (duplicates collapse).
    pub fn from_kinds(kinds: impl IntoIterator<Item = ArtifactKind>) -> Self {
        IncludeSet(kinds.into_iter().collect())
    }

    /// All four kinds.
    pub fn all() -> Self {
        Self::from_kinds(ArtifactKind::ALL)
    }

    /// Reject an empty set.
    pub fn validate(&self) -> kd_common::Result<()> {
        if self.0.is_empty() {
            return Err(kd_common::Error::EmptyIncludeSet);
        }
        Ok(())
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate kinds in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.0.iter().copied()
    }
}

/// A single telemetry record as returned by a source adapter.
///
/// Identity (`id`, `connection_id`, `namespace_id`, `timestamp`) is stable
/// across repeated fetches and survives redaction unchanged, so a manifest
/// can reference original IDs without re-exposing raw content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArtifactRecord {
    pub id: ArtifactId,
    pub connection_id: ConnectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<NamespaceId>,
    pub timestamp: DateTime<Utc>,
    pub payload: ArtifactPayload,
    /// Names of payload fields the source adapter tagged as potentially
    /// sensitive. Consumed by the strict redaction profile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive_fields: Vec<String>,
}

impl RawArtifactRecord {
    pub fn kind(&self) -> ArtifactKind {
        self.payload.kind()
    }

    /// Ordering key used everywhere records are sorted: `(timestamp, id)`.
    pub fn sort_key(&self) -> (DateTime<Utc>, &ArtifactId) {
        (self.timestamp, &self.id)
    }
}

/// Kind-specific payload with well-known fields plus an extra-attributes map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Timeline(TimelineEvent),
    Logs(LogEvent),
    Diagnostics(DiagnosticEvent),
    Metrics(MetricSnapshot),
}

impl ArtifactPayload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactPayload::Timeline(_) => ArtifactKind::Timeline,
            ArtifactPayload::Logs(_) => ArtifactKind::Logs,
            ArtifactPayload::Diagnostics(_) => ArtifactKind::Diagnostics,
            ArtifactPayload::Metrics(_) => ArtifactKind::Metrics,
        }
    }
}

/// Timeline event: a state change on a monitored connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event type, e.g. `connection_lost`, `failover`, `config_rewrite`.
    pub event_type: String,
    /// Free-text summary of the event.
    pub summary: String,
    /// Hostname of the server the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_host: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Structured log event captured from a monitored deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: String,
    /// Logger/component that produced the event.
    pub source: String,
    /// Free-text log message.
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Failure diagnostic: a captured error with its operational context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// Failure classification, e.g. `timeout`, `oom`, `auth_failure`.
    pub failure_kind: String,
    /// Free-text error message.
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_host: Option<String>,
    /// The command text associated with the failure, if captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Key name or glob pattern involved in the failure, if captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Point-in-time metric snapshot for one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_host: Option<String>,
    /// Named gauges, e.g. `used_memory_bytes`, `connected_clients`.
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> RawArtifactRecord {
        RawArtifactRecord {
            id: ArtifactId::from("tl-001"),
            connection_id: ConnectionId::from("conn-1"),
            namespace_id: None,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            payload: ArtifactPayload::Timeline(TimelineEvent {
                event_type: "connection_lost".into(),
                summary: "connection to redis-prod dropped".into(),
                server_host: Some("redis-prod.internal".into()),
                extra: BTreeMap::new(),
            }),
            sensitive_fields: Vec::new(),
        }
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(ArtifactKind::parse_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ArtifactKind::parse_str("bogus"), None);
    }

    #[test]
    fn test_include_set_canonical_order() {
        let set = IncludeSet::from_kinds([
            ArtifactKind::Metrics,
            ArtifactKind::Timeline,
            ArtifactKind::Logs,
        ]);
        let kinds: Vec<_> = set.iter().collect();
        assert_eq!(
            kinds,
            vec![
                ArtifactKind::Timeline,
                ArtifactKind::Logs,
                ArtifactKind::Metrics
            ]
        );
    }

    #[test]
    fn test_include_set_empty_rejected() {
        let set = IncludeSet::from_kinds([]);
        assert!(matches!(
            set.validate(),
            Err(kd_common::Error::EmptyIncludeSet)
        ));
        assert!(IncludeSet::all().validate().is_ok());
    }

    #[test]
    fn test_include_set_duplicates_collapse() {
        let set = IncludeSet::from_kinds([ArtifactKind::Logs, ArtifactKind::Logs]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_record_kind_matches_payload() {
        let record = sample_record();
        assert_eq!(record.kind(), ArtifactKind::Timeline);
    }

    #[test]
    fn test_payload_serde_tag() {
        let record = sample_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["payload"]["kind"], "timeline");
        assert_eq!(json["payload"]["event_type"], "connection_lost");

        let back: RawArtifactRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_extra_map_order_is_stable() {
        let mut extra = BTreeMap::new();
        extra.insert("zeta".to_string(), serde_json::json!(1));
        extra.insert("alpha".to_string(), serde_json::json!(2));
        let event = LogEvent {
            level: "warn".into(),
            source: "replication".into(),
            message: "lag".into(),
            extra,
        };
        let json = serde_json::to_string(&event).unwrap();
        let alpha = json.find("alpha").unwrap();
        let zeta = json.find("zeta").unwrap();
        assert!(alpha < zeta);
    }
}
