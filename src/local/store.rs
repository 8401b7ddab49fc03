//! Local Store Module
//!
//! Fixed-capacity, TTL-aware key/value store living in process memory.
//! Several clients may share one store through [`SharedLocalStore`], each
//! writing under its own key prefix.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::{CacheError, Result};
use crate::keys::LOCAL_KEY_CEILING;
use crate::local::{CacheStats, LocalEntry, LruTracker, MAX_VALUE_SIZE};

/// A local store shared by every client of the process.
pub type SharedLocalStore = Arc<Mutex<LocalStore>>;

// == Local Store ==
/// Local key/value storage with LRU eviction and per-entry TTL.
#[derive(Debug)]
pub struct LocalStore {
    /// Key-value storage
    entries: HashMap<String, LocalEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl LocalStore {
    // == Constructor ==
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity,
        }
    }

    /// Creates an empty store ready to be shared between clients.
    pub fn shared(capacity: usize) -> SharedLocalStore {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `ttl` is in seconds; `None` keeps the entry until it is deleted or
    /// evicted. At capacity, the least recently used entry makes room.
    pub fn set(&mut self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        if key.is_empty() || key.len() > LOCAL_KEY_CEILING {
            return Err(CacheError::InvalidArgument(format!(
                "local key must be 1..={} bytes, got {}",
                LOCAL_KEY_CEILING,
                key.len()
            )));
        }

        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidArgument(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            match self.lru.evict_oldest() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                }
                None => {
                    return Err(CacheError::InvalidArgument(
                        "local store has no capacity".to_string(),
                    ))
                }
            }
        }

        self.entries
            .insert(key.to_string(), LocalEntry::new(value, ttl));
        self.lru.touch(key);
        self.stats.set_total_entries(self.entries.len());

        Ok(())
    }

    // == Get ==
    /// Returns the live value for `key`. Expired entries are dropped on read.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns the entry for `key` without touching recency or statistics.
    pub fn peek(&self, key: &str) -> Option<&LocalEntry> {
        self.entries.get(key).filter(|entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes `key`; returns whether an entry was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Flush ==
    /// Removes every entry whose key starts with `prefix`; returns the count.
    pub fn flush_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        for key in &doomed {
            self.remove_entry(key);
        }

        self.stats.set_total_entries(self.entries.len());
        doomed.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries; returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired.len());
        self.stats.set_total_entries(self.entries.len());
        expired.len()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }
}
