//! Local Entry Module
//!
//! A single local-cache value with its optional deadline.

use std::time::{Duration, Instant};

// == Local Entry ==
/// A value held by the local store.
#[derive(Debug, Clone)]
pub struct LocalEntry {
    /// The stored value
    pub value: String,
    /// Deadline after which the entry is dead, None = no expiration
    pub expires_at: Option<Instant>,
}

impl LocalEntry {
    // == Constructor ==
    /// Creates an entry that lives for `ttl_seconds`, or forever when `None`.
    ///
    /// A deadline past what `Instant` can represent also means forever.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        Self {
            value,
            expires_at: ttl_seconds
                .and_then(|ttl| Instant::now().checked_add(Duration::from_secs(ttl))),
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current instant reaches its deadline.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Expiry check against a caller-supplied instant, so sweeps use one clock reading.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    // == Time To Live ==
    /// Remaining lifetime, `Some(ZERO)` once expired, `None` without a deadline.
    #[cfg(test)]
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = LocalEntry::new("value".to_string(), None);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = LocalEntry::new("value".to_string(), Some(1));
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let entry = LocalEntry::new("value".to_string(), Some(u64::MAX));

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = LocalEntry::new("value".to_string(), Some(10));

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = LocalEntry {
            value: "value".to_string(),
            expires_at: Some(now),
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at its deadline");
    }
}
