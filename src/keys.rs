//! Local Key Encoding
//!
//! Derives bounded local-cache keys from a database index and a logical key.
//! The local store caps keys at [`LOCAL_KEY_CEILING`] characters, namespace
//! prefix included, so long keys are replaced by a fixed-width digest.

use sha2::{Digest, Sha256};

// == Constants ==
/// Absolute key length accepted by the local store, prefix included
pub const LOCAL_KEY_CEILING: usize = 48;

/// Width of a digest-based key (128 bits as lowercase hex)
pub const HASHED_KEY_LENGTH: usize = 32;

/// Longest prefix that still leaves room for a digest-based key
pub const MAX_PREFIX_LENGTH: usize = LOCAL_KEY_CEILING - HASHED_KEY_LENGTH;

// == Key Codec ==
/// Encodes `(db, key)` pairs into keys that fit the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    enabled: bool,
    max_key_length: usize,
}

impl KeyCodec {
    /// Builds a codec for the given local cache prefix.
    ///
    /// An empty prefix yields a disabled codec whose `encode` always returns
    /// `None`.
    pub fn new(prefix: &str) -> Self {
        Self {
            enabled: !prefix.is_empty(),
            max_key_length: LOCAL_KEY_CEILING.saturating_sub(prefix.len()),
        }
    }

    /// Longest natural encoding kept verbatim.
    pub fn max_key_length(&self) -> usize {
        self.max_key_length
    }

    /// Returns the local key for `key` in database `db`, or `None` when the
    /// local layer is disabled or the key is empty.
    pub fn encode(&self, db: u8, key: &str) -> Option<String> {
        if !self.enabled || key.is_empty() {
            return None;
        }

        let natural = format!("{}_{}", db, key);
        if natural.len() > self.max_key_length {
            Some(digest(&natural))
        } else {
            Some(natural)
        }
    }
}

fn digest(natural: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(natural.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(HASHED_KEY_LENGTH);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_disabled_without_prefix() {
        let codec = KeyCodec::new("");
        assert_eq!(codec.encode(0, "user:1"), None);
    }

    #[test]
    fn test_empty_key_is_not_encoded() {
        let codec = KeyCodec::new("app");
        assert_eq!(codec.encode(0, ""), None);
    }

    #[test]
    fn test_natural_encoding() {
        let codec = KeyCodec::new("app");
        assert_eq!(codec.encode(3, "user:1").as_deref(), Some("3_user:1"));
        assert_eq!(codec.max_key_length(), LOCAL_KEY_CEILING - 3);
    }

    #[test]
    fn test_database_index_separates_keys() {
        let codec = KeyCodec::new("app");
        assert_ne!(codec.encode(0, "k"), codec.encode(1, "k"));
    }

    #[test]
    fn test_boundary_length_stays_natural() {
        let codec = KeyCodec::new("app");
        // "0_" + key must be exactly max_key_length
        let key = "k".repeat(codec.max_key_length() - 2);
        let encoded = codec.encode(0, &key).unwrap();
        assert_eq!(encoded, format!("0_{}", key));

        let key = "k".repeat(codec.max_key_length() - 1);
        let encoded = codec.encode(0, &key).unwrap();
        assert_eq!(encoded.len(), HASHED_KEY_LENGTH);
    }

    #[test]
    fn test_long_keys_hash_independently() {
        let codec = KeyCodec::new("app");
        let common = "x".repeat(64);
        let a = codec.encode(0, &format!("{}a", common)).unwrap();
        let b = codec.encode(0, &format!("{}b", common)).unwrap();

        assert_eq!(a.len(), HASHED_KEY_LENGTH);
        assert_eq!(b.len(), HASHED_KEY_LENGTH);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_encoded_key_fits_ceiling(
            prefix in "[a-z]{1,16}",
            db in 0u8..16,
            key in "[ -~]{1,200}"
        ) {
            let codec = KeyCodec::new(&prefix);
            let encoded = codec.encode(db, &key).unwrap();
            prop_assert!(prefix.len() + encoded.len() <= LOCAL_KEY_CEILING);
        }

        #[test]
        fn prop_encoding_is_deterministic(db in 0u8..16, key in "[a-z0-9:]{1,100}") {
            let codec = KeyCodec::new("svc");
            prop_assert_eq!(codec.encode(db, &key), codec.encode(db, &key));
        }
    }
}
