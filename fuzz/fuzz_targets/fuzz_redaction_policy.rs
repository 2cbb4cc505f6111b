//! Fuzz target for redaction policy deserialization and validation.

#![no_main]

use kd_redact::RedactionPolicy;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(policy) = serde_json::from_str::<RedactionPolicy>(text) {
            let _ = policy.validate();
        }
    }
});
