//! Deterministic short hashing for masked-but-correlatable values.
//!
//! Unkeyed on purpose: the bundle checksum contract requires that redacting
//! the same input always yields the same bytes, across process restarts and
//! across resume of an export job.

use sha2::{Digest, Sha256};

/// Replace a value with a truncated SHA-256 marker, e.g. `[HASH:1f2a3b4c5d6e7f80]`.
///
/// `truncation_bytes` controls how many digest bytes are kept (hex doubles
/// the visible length).
pub fn short_hash(value: &str, truncation_bytes: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let take = truncation_bytes.clamp(1, digest.len());
    format!("[HASH:{}]", hex::encode(&digest[..take]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash_deterministic() {
        let a = short_hash("cache-1.internal", 8);
        let b = short_hash("cache-1.internal", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_hash_distinguishes_values() {
        assert_ne!(short_hash("cache-1", 8), short_hash("cache-2", 8));
    }

    #[test]
    fn test_short_hash_length() {
        let h = short_hash("value", 8);
        // "[HASH:" + 16 hex chars + "]"
        assert_eq!(h.len(), 7 + 16 + 1);
        assert!(h.starts_with("[HASH:"));
        assert!(h.ends_with(']'));
    }

    #[test]
    fn test_truncation_is_clamped() {
        let h = short_hash("value", 0);
        assert_eq!(h.len(), 7 + 2 + 1);
        let full = short_hash("value", 999);
        assert_eq!(full.len(), 7 + 64 + 1);
    }
}
