//! Field classification for redaction decisions.

use crate::policy::RedactionProfile;
use serde::{Deserialize, Serialize};

/// Classification of telemetry payload fields.
///
/// Each class has a built-in action per profile, which the redaction policy
/// can override (subject to the monotonicity check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// Credential material (passwords, tokens); always masked
    Credential,
    /// Key name or glob pattern from the keyspace
    KeyPattern,
    /// Server/connection hostname
    Hostname,
    /// Captured command text (may embed key names and AUTH arguments)
    CommandText,
    /// Free-form text (summaries, log messages, error text)
    FreeText,
    /// Metric gauge name
    MetricName,
    /// Closed-vocabulary identifier (event types, log levels, component names)
    Identifier,
    /// Catch-all for the extra-attributes map
    ExtraAttribute,
}

impl FieldClass {
    /// Returns the built-in action for this class under a profile.
    ///
    /// Invariant: for every class, the strict action is at least as strong
    /// as the default action (see `Action::strength`). Credential-content
    /// detection runs before these rules and masks under both profiles.
    pub fn default_action(&self, profile: RedactionProfile) -> crate::Action {
        use crate::Action;
        match (self, profile) {
            (FieldClass::Credential, _) => Action::Mask,

            (FieldClass::KeyPattern, RedactionProfile::Default) => Action::Allow,
            (FieldClass::KeyPattern, RedactionProfile::Strict) => Action::Hash,

            (FieldClass::Hostname, RedactionProfile::Default) => Action::Allow,
            (FieldClass::Hostname, RedactionProfile::Strict) => Action::Hash,

            (FieldClass::CommandText, RedactionProfile::Default) => Action::Truncate,
            (FieldClass::CommandText, RedactionProfile::Strict) => Action::Hash,

            (FieldClass::FreeText, _) => Action::Truncate,

            (FieldClass::MetricName, _) => Action::Allow,

            (FieldClass::Identifier, _) => Action::Allow,

            (FieldClass::ExtraAttribute, RedactionProfile::Default) => Action::Allow,
            (FieldClass::ExtraAttribute, RedactionProfile::Strict) => Action::Mask,
        }
    }

    /// All classes, for table-wide checks.
    pub const ALL: [FieldClass; 8] = [
        FieldClass::Credential,
        FieldClass::KeyPattern,
        FieldClass::Hostname,
        FieldClass::CommandText,
        FieldClass::FreeText,
        FieldClass::MetricName,
        FieldClass::Identifier,
        FieldClass::ExtraAttribute,
    ];

    /// Parse a field class from a string.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "credential" => Some(FieldClass::Credential),
            "key_pattern" => Some(FieldClass::KeyPattern),
            "hostname" => Some(FieldClass::Hostname),
            "command_text" => Some(FieldClass::CommandText),
            "free_text" => Some(FieldClass::FreeText),
            "metric_name" => Some(FieldClass::MetricName),
            "identifier" => Some(FieldClass::Identifier),
            "extra_attribute" => Some(FieldClass::ExtraAttribute),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldClass::Credential => "credential",
            FieldClass::KeyPattern => "key_pattern",
            FieldClass::Hostname => "hostname",
            FieldClass::CommandText => "command_text",
            FieldClass::FreeText => "free_text",
            FieldClass::MetricName => "metric_name",
            FieldClass::Identifier => "identifier",
            FieldClass::ExtraAttribute => "extra_attribute",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_is_at_least_as_strong_for_every_class() {
        for class in FieldClass::ALL {
            let default = class.default_action(RedactionProfile::Default);
            let strict = class.default_action(RedactionProfile::Strict);
            assert!(
                strict.strength() >= default.strength(),
                "class {} violates monotonicity: default={}, strict={}",
                class,
                default,
                strict
            );
        }
    }

    #[test]
    fn test_credential_always_masked() {
        assert_eq!(
            FieldClass::Credential.default_action(RedactionProfile::Default),
            crate::Action::Mask
        );
        assert_eq!(
            FieldClass::Credential.default_action(RedactionProfile::Strict),
            crate::Action::Mask
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for class in FieldClass::ALL {
            assert_eq!(FieldClass::parse_str(&class.to_string()), Some(class));
        }
        assert_eq!(FieldClass::parse_str("cmdline"), None);
    }
}
