//! Redaction profiles and policy configuration.

use crate::{Action, FieldClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Schema version for the policy file.
pub const POLICY_SCHEMA_VERSION: &str = "1.0.0";

/// Named redaction level applied to every record in a bundle.
///
/// `default` masks credential-like content and truncates long free text.
/// `strict` additionally masks key names/patterns, hostnames, and any field
/// the source adapter tagged as potentially sensitive. Strict masking is a
/// superset of default masking by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionProfile {
    #[default]
    Default,
    Strict,
}

impl RedactionProfile {
    /// Parse from string.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" => Some(RedactionProfile::Default),
            "strict" => Some(RedactionProfile::Strict),
            _ => None,
        }
    }
}

impl std::fmt::Display for RedactionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RedactionProfile::Default => "default",
            RedactionProfile::Strict => "strict",
        };
        write!(f, "{}", s)
    }
}

/// Per-class override: one action per profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldRule {
    pub default_action: Action,
    pub strict_action: Action,
}

/// Redaction policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionPolicy {
    /// Schema version.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Free-text length threshold above which `Truncate` clamps.
    #[serde(default = "default_free_text_max_len")]
    pub free_text_max_len: usize,

    /// Entropy threshold for high-entropy credential detection.
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,

    /// Hash truncation bytes (default 8 = 16 hex chars).
    #[serde(default = "default_truncation_bytes")]
    pub hash_truncation_bytes: usize,

    /// Per-field-class overrides, keyed by field class name.
    #[serde(default)]
    pub field_rules: BTreeMap<String, FieldRule>,
}

fn default_schema_version() -> String {
    POLICY_SCHEMA_VERSION.to_string()
}

fn default_free_text_max_len() -> usize {
    512
}

fn default_entropy_threshold() -> f64 {
    4.5
}

fn default_truncation_bytes() -> usize {
    8
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            free_text_max_len: default_free_text_max_len(),
            entropy_threshold: default_entropy_threshold(),
            hash_truncation_bytes: default_truncation_bytes(),
            field_rules: BTreeMap::new(),
        }
    }
}

impl RedactionPolicy {
    /// Create a new policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load policy from a JSON file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let policy: RedactionPolicy = serde_json::from_str(&content)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Save policy to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the action for a field class under a profile.
    pub fn action_for(&self, class: FieldClass, profile: RedactionProfile) -> Action {
        if let Some(rule) = self.field_rules.get(&class.to_string()) {
            return match profile {
                RedactionProfile::Default => rule.default_action,
                RedactionProfile::Strict => rule.strict_action,
            };
        }
        class.default_action(profile)
    }

    /// Set an override for a field class.
    pub fn set_rule(&mut self, class: FieldClass, rule: FieldRule) {
        self.field_rules.insert(class.to_string(), rule);
    }

    /// Validate the policy: overrides must name known classes and must keep
    /// strict masking at least as strong as default masking.
    pub fn validate(&self) -> crate::Result<()> {
        for (name, rule) in &self.field_rules {
            if FieldClass::parse_str(name).is_none() {
                return Err(crate::RedactionError::InvalidPolicy(format!(
                    "unknown field class: {}",
                    name
                )));
            }
            if rule.strict_action.strength() < rule.default_action.strength() {
                return Err(crate::RedactionError::InvalidPolicy(format!(
                    "rule for {} weakens strict profile: default={}, strict={}",
                    name, rule.default_action, rule.strict_action
                )));
            }
        }
        Ok(())
    }
}
