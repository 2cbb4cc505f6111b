//! Fuzz target for manifest JSON parsing and validation.

#![no_main]

use kd_bundle::BundleManifest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(manifest) = BundleManifest::from_json(text) {
            let _ = manifest.validate();
            let _ = manifest.canonical_bytes();
        }
    }
});
