//! Redaction pipeline for kvdesk incident bundles.
//!
//! Every record leaving the telemetry stores for an incident bundle passes
//! through this crate. The pipeline is a pure function from a raw record and
//! a redaction profile to a sanitized copy:
//!
//! - **Field-aware masking**: well-known fields carry a field class, and the
//!   class decides the action per profile. `strict` masking is a superset of
//!   `default` masking for every class.
//! - **Credential detection**: AUTH/requirepass arguments, URL-embedded
//!   credentials, tokens, and high-entropy strings are masked under both
//!   profiles, before any class rule applies.
//! - **Fail-safe**: malformed or structurally opaque values are masked rather
//!   than rejected; redaction never errors on well-formed input.
//! - **Determinism**: the hashing action is an unkeyed truncated SHA-256, so
//!   repeated redaction of the same input is byte-identical, a requirement
//!   of the bundle checksum contract.
//!
//! # Example
//!
//! ```no_run
//! use kd_redact::{RedactionProfile, Redactor};
//!
//! let redactor = Redactor::with_defaults();
//! // let redacted = redactor.redact_record(&record, RedactionProfile::Strict);
//! ```

pub mod action;
pub mod detect;
pub mod engine;
pub mod error;
pub mod field_class;
pub mod hash;
pub mod policy;

pub use action::Action;
pub use detect::{CredentialDetector, CredentialKind};
pub use engine::{RedactedArtifactRecord, Redactor, MASK_PLACEHOLDER, TRUNCATION_MARKER};
pub use error::{RedactionError, Result};
pub use field_class::FieldClass;
pub use hash::short_hash;
pub use policy::{FieldRule, RedactionPolicy, RedactionProfile};
