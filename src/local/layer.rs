//! Local Cache Layer
//!
//! Adapter between the client and the shared local store. It namespaces keys
//! with the client's prefix, encodes "confirmed absent upstream" as a
//! sentinel value, and swallows local-store failures so the client can keep
//! serving from the remote store alone.

use std::sync::MutexGuard;

use tracing::warn;

use crate::local::{CacheStats, LocalStore, SharedLocalStore};

/// Marker stored locally for keys the remote store reported missing.
pub const NEGATIVE_SENTINEL: &str = "\u{0}dualcache:absent\u{0}";

// == Lookup ==
/// Outcome of a local probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A cached value
    Hit(String),
    /// A negative entry: the remote store has no such key
    Absent,
    /// Nothing usable locally
    Miss,
}

// == Local Cache Layer ==
#[derive(Debug, Clone)]
pub struct LocalCacheLayer {
    store: Option<SharedLocalStore>,
    prefix: String,
}

impl LocalCacheLayer {
    /// Creates a layer writing into `store` under `prefix`.
    ///
    /// An empty prefix produces a disabled layer.
    pub fn new(store: SharedLocalStore, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Self::disabled();
        }
        Self {
            store: Some(store),
            prefix,
        }
    }

    /// A layer that misses on every read and ignores every write.
    pub fn disabled() -> Self {
        Self {
            store: None,
            prefix: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // == Get ==
    pub fn get(&self, key: &str) -> Lookup {
        let full = self.full_key(key);
        match self.with_store(|store| store.get(&full)).flatten() {
            Some(value) if value == NEGATIVE_SENTINEL => Lookup::Absent,
            Some(value) => Lookup::Hit(value),
            None => Lookup::Miss,
        }
    }

    // == Set ==
    /// Caches `value`; `ttl` in seconds, 0 keeps it until evicted.
    ///
    /// A value equal to the sentinel is never cached, so it cannot be
    /// mistaken for a negative entry later.
    pub fn set(&self, key: &str, value: &str, ttl: u64) {
        if value == NEGATIVE_SENTINEL {
            self.delete(key);
            return;
        }
        self.write(key, value, ttl);
    }

    /// Records that the remote store has no value for `key`.
    pub fn set_absent(&self, key: &str, ttl: u64) {
        self.write(key, NEGATIVE_SENTINEL, ttl);
    }

    // == Delete ==
    pub fn delete(&self, key: &str) {
        let full = self.full_key(key);
        self.with_store(|store| store.delete(&full));
    }

    // == Refresh TTL ==
    /// Re-inserts the current value with a new TTL; no-op when nothing is cached.
    ///
    /// A negative entry is dropped instead: the key just accepted a TTL
    /// upstream, so it exists there.
    pub fn refresh_ttl(&self, key: &str, ttl: u64) {
        match self.get(key) {
            Lookup::Hit(value) => self.write(key, &value, ttl),
            Lookup::Absent => self.delete(key),
            Lookup::Miss => {}
        }
    }

    // == Clear ==
    /// Drops every entry in this layer's namespace.
    pub fn clear(&self) {
        let prefix = self.prefix.clone();
        self.with_store(|store| store.flush_prefix(&prefix));
    }

    /// Statistics of the underlying store, `None` when disabled.
    pub fn stats(&self) -> Option<CacheStats> {
        self.with_store(|store| store.stats())
    }

    fn write(&self, key: &str, value: &str, ttl: u64) {
        let full = self.full_key(key);
        let ttl = (ttl > 0).then_some(ttl);
        let result = self.with_store(|store| store.set(&full, value.to_string(), ttl));
        if let Some(Err(e)) = result {
            warn!(key = %full, error = %e, "local cache write skipped");
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut LocalStore) -> R) -> Option<R> {
        let store = self.store.as_ref()?;
        let mut guard: MutexGuard<'_, LocalStore> = match store.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(prefix = %self.prefix, "local store lock poisoned, serving remote only");
                return None;
            }
        };
        Some(f(&mut *guard))
    }
}
