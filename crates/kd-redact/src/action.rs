//! Redaction actions.

use serde::{Deserialize, Serialize};

/// Action to apply when redacting a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Persist as-is (no modification)
    Allow,
    /// Clamp free text above the policy length threshold
    Truncate,
    /// Replace with truncated unkeyed hash `[HASH:hex]`
    Hash,
    /// Remove/replace entirely with `[REDACTED]`
    Mask,
}

impl Action {
    /// Parse an action from a string.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Action::Allow),
            "truncate" => Some(Action::Truncate),
            "hash" => Some(Action::Hash),
            "mask" => Some(Action::Mask),
            _ => None,
        }
    }

    /// Returns whether this action modifies the value.
    pub fn is_masking(&self) -> bool {
        !matches!(self, Action::Allow)
    }

    /// Masking strength for monotonicity comparisons. The strict profile
    /// must never apply a weaker action than the default profile.
    pub fn strength(&self) -> u8 {
        match self {
            Action::Allow => 0,
            Action::Truncate => 1,
            Action::Hash => 2,
            Action::Mask => 3,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Allow => "allow",
            Action::Truncate => "truncate",
            Action::Hash => "hash",
            Action::Mask => "mask",
        };
        write!(f, "{}", s)
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::Mask // Fail-closed default
    }
}
