//! Fuzz target for .ibundle archive reading.
//!
//! Bundles may be re-opened from disk after manual handling, so arbitrary
//! input must fail cleanly without panicking.

#![no_main]

use kd_bundle::BundleReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The reader expects a ZIP with a manifest; most random data fails fast.
    if let Ok(mut reader) = BundleReader::from_bytes(data.to_vec()) {
        let _ = reader.verify();
    }
});
