//! Fuzz target for telemetry record parsing and redaction.
//!
//! Any record that deserializes must survive redaction under both profiles
//! without panicking (the redactor is total by contract).

#![no_main]

use kd_redact::{RedactionProfile, Redactor};
use kd_telemetry::RawArtifactRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = serde_json::from_slice::<RawArtifactRecord>(data) else {
        return;
    };
    let redactor = Redactor::with_defaults();
    for profile in [RedactionProfile::Default, RedactionProfile::Strict] {
        let redacted = redactor.redact_record(&record, profile);
        let _ = redacted.canonical_bytes();
    }
});
