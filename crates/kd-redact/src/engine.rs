//! Record-level redaction engine.
//!
//! `Redactor::redact_record` is a pure function: no I/O, no side effects,
//! and it never fails for well-formed input. Malformed or structurally
//! opaque values are masked rather than rejected.

use crate::{
    policy::RedactionProfile, Action, CredentialDetector, FieldClass, RedactionPolicy, short_hash,
};
use chrono::{DateTime, Utc};
use kd_common::{ArtifactId, ConnectionId, NamespaceId};
use kd_telemetry::{
    ArtifactKind, ArtifactPayload, DiagnosticEvent, LogEvent, MetricSnapshot, RawArtifactRecord,
    TimelineEvent,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replacement for fully masked values.
pub const MASK_PLACEHOLDER: &str = "[REDACTED]";

/// Marker appended to clamped free text.
pub const TRUNCATION_MARKER: &str = "[TRUNCATED]";

static RE_CREDENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|secret|token|credential|api[-_]?key|auth)")
        .expect("valid regex")
});

/// A sanitized copy of a raw record.
///
/// Identity fields are preserved verbatim so manifests can reference the
/// original IDs; only payload content is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedArtifactRecord {
    pub id: ArtifactId,
    pub connection_id: ConnectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<NamespaceId>,
    pub timestamp: DateTime<Utc>,
    pub profile: RedactionProfile,
    pub payload: ArtifactPayload,
}

impl RedactedArtifactRecord {
    pub fn kind(&self) -> ArtifactKind {
        self.payload.kind()
    }

    /// Ordering key: `(timestamp, id)`, same as the raw record.
    pub fn sort_key(&self) -> (DateTime<Utc>, &ArtifactId) {
        (self.timestamp, &self.id)
    }

    /// Canonical serialization of this record.
    ///
    /// Compact JSON with declaration-order struct fields and sorted maps;
    /// the bundle checksum is computed over exactly these bytes, so the
    /// encoding must never change observably for unchanged input.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// The redaction engine: applies a policy and credential detection to
/// whole records.
#[derive(Debug, Clone)]
pub struct Redactor {
    policy: RedactionPolicy,
    detector: CredentialDetector,
}

impl Redactor {
    /// Create an engine with the given policy.
    pub fn new(policy: RedactionPolicy) -> Self {
        let detector = CredentialDetector::with_entropy_threshold(policy.entropy_threshold);
        Redactor { policy, detector }
    }

    /// Create an engine with the built-in default policy.
    pub fn with_defaults() -> Self {
        Self::new(RedactionPolicy::default())
    }

    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    /// Redact a record under a profile. Pure and total.
    pub fn redact_record(
        &self,
        record: &RawArtifactRecord,
        profile: RedactionProfile,
    ) -> RedactedArtifactRecord {
        let tagged = &record.sensitive_fields;
        let payload = match &record.payload {
            ArtifactPayload::Timeline(e) => ArtifactPayload::Timeline(TimelineEvent {
                event_type: self.field(&e.event_type, FieldClass::Identifier, profile, tagged, "event_type"),
                summary: self.field(&e.summary, FieldClass::FreeText, profile, tagged, "summary"),
                server_host: e.server_host.as_deref().map(|v| {
                    self.field(v, FieldClass::Hostname, profile, tagged, "server_host")
                }),
                extra: self.redact_extra(&e.extra, profile, tagged),
            }),
            ArtifactPayload::Logs(e) => ArtifactPayload::Logs(LogEvent {
                level: self.field(&e.level, FieldClass::Identifier, profile, tagged, "level"),
                source: self.field(&e.source, FieldClass::Identifier, profile, tagged, "source"),
                message: self.field(&e.message, FieldClass::FreeText, profile, tagged, "message"),
                extra: self.redact_extra(&e.extra, profile, tagged),
            }),
            ArtifactPayload::Diagnostics(e) => ArtifactPayload::Diagnostics(DiagnosticEvent {
                failure_kind: self.field(&e.failure_kind, FieldClass::Identifier, profile, tagged, "failure_kind"),
                error_message: self.field(&e.error_message, FieldClass::FreeText, profile, tagged, "error_message"),
                server_host: e.server_host.as_deref().map(|v| {
                    self.field(v, FieldClass::Hostname, profile, tagged, "server_host")
                }),
                command: e.command.as_deref().map(|v| {
                    self.field(v, FieldClass::CommandText, profile, tagged, "command")
                }),
                key_pattern: e.key_pattern.as_deref().map(|v| {
                    self.field(v, FieldClass::KeyPattern, profile, tagged, "key_pattern")
                }),
                extra: self.redact_extra(&e.extra, profile, tagged),
            }),
            ArtifactPayload::Metrics(e) => ArtifactPayload::Metrics(MetricSnapshot {
                server_host: e.server_host.as_deref().map(|v| {
                    self.field(v, FieldClass::Hostname, profile, tagged, "server_host")
                }),
                metrics: self.redact_metrics(&e.metrics, profile, tagged),
                extra: self.redact_extra(&e.extra, profile, tagged),
            }),
        };

        RedactedArtifactRecord {
            id: record.id.clone(),
            connection_id: record.connection_id.clone(),
            namespace_id: record.namespace_id.clone(),
            timestamp: record.timestamp,
            profile,
            payload,
        }
    }

    /// Redact one well-known string field.
    fn field(
        &self,
        value: &str,
        class: FieldClass,
        profile: RedactionProfile,
        tagged: &[String],
        field_name: &str,
    ) -> String {
        let is_tagged = tagged.iter().any(|t| t == field_name);
        if is_tagged && profile == RedactionProfile::Strict {
            return MASK_PLACEHOLDER.to_string();
        }
        // Credential content masks under both profiles, before class rules.
        if self.detector.detect(value).is_some() {
            return MASK_PLACEHOLDER.to_string();
        }
        self.apply(value, self.policy.action_for(class, profile))
    }

    fn apply(&self, value: &str, action: Action) -> String {
        match action {
            Action::Allow => value.to_string(),
            Action::Truncate => self.truncate_text(value),
            Action::Hash => short_hash(value, self.policy.hash_truncation_bytes),
            Action::Mask => MASK_PLACEHOLDER.to_string(),
        }
    }

    fn truncate_text(&self, value: &str) -> String {
        let max = self.policy.free_text_max_len;
        match value.char_indices().nth(max) {
            Some((byte_idx, _)) => format!("{}{}", &value[..byte_idx], TRUNCATION_MARKER),
            None => value.to_string(),
        }
    }

    /// Catch-all rule for the extra-attributes map.
    ///
    /// Keys stay (attribute names are identifiers); values are redacted.
    /// Nested arrays/objects are opaque to field classification and are
    /// masked under both profiles.
    fn redact_extra(
        &self,
        extra: &BTreeMap<String, serde_json::Value>,
        profile: RedactionProfile,
        tagged: &[String],
    ) -> BTreeMap<String, serde_json::Value> {
        extra
            .iter()
            .map(|(key, value)| {
                let class = if RE_CREDENTIAL_KEY.is_match(key) {
                    FieldClass::Credential
                } else {
                    FieldClass::ExtraAttribute
                };
                let is_tagged = tagged.iter().any(|t| t == key);
                let action = if is_tagged && profile == RedactionProfile::Strict {
                    Action::Mask
                } else {
                    self.policy.action_for(class, profile)
                };
                let redacted = match (value, action) {
                    (_, Action::Mask) => serde_json::Value::String(MASK_PLACEHOLDER.to_string()),
                    (serde_json::Value::String(s), action) => {
                        if self.detector.detect(s).is_some() {
                            serde_json::Value::String(MASK_PLACEHOLDER.to_string())
                        } else {
                            serde_json::Value::String(self.apply(s, action))
                        }
                    }
                    (
                        v @ (serde_json::Value::Number(_)
                        | serde_json::Value::Bool(_)
                        | serde_json::Value::Null),
                        _,
                    ) => v.clone(),
                    (serde_json::Value::Array(_) | serde_json::Value::Object(_), _) => {
                        serde_json::Value::String(MASK_PLACEHOLDER.to_string())
                    }
                };
                (key.clone(), redacted)
            })
            .collect()
    }

    /// Metric gauge names under strict with a sensitivity tag are hashed
    /// rather than masked so distinct gauges stay distinct keys.
    fn redact_metrics(
        &self,
        metrics: &BTreeMap<String, f64>,
        profile: RedactionProfile,
        tagged: &[String],
    ) -> BTreeMap<String, f64> {
        let all_tagged = tagged.iter().any(|t| t == "metrics");
        metrics
            .iter()
            .map(|(name, value)| {
                let is_tagged = all_tagged || tagged.iter().any(|t| t == name);
                let name = if is_tagged && profile == RedactionProfile::Strict {
                    short_hash(name, self.policy.hash_truncation_bytes)
                } else {
                    self.apply(name, self.policy.action_for(FieldClass::MetricName, profile))
                };
                (name, *value)
            })
            .collect()
    }
}
