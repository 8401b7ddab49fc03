//! Local Cache Module
//!
//! Process-local store with TTL expiration and LRU eviction, plus the layer
//! the client uses to read and write it.

mod entry;
mod layer;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::LocalEntry;
pub use layer::{LocalCacheLayer, Lookup, NEGATIVE_SENTINEL};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{LocalStore, SharedLocalStore};

// == Public Constants ==
/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Longest TTL in seconds accepted by the client (ten years)
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;
