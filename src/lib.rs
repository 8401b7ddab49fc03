//! dualcache - a two-level cache client
//!
//! A Redis client fronted by a process-local cache with per-entry TTL and
//! negative caching, plus an HTTP gateway exposing one client over REST.

pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod keys;
pub mod local;
pub mod models;
pub mod remote;
pub mod service;
pub mod tasks;

pub use api::{create_router, AppState};
pub use client::CacheClient;
pub use config::{ClientConfig, GatewayConfig};
pub use connection::ConnectionManager;
pub use error::{CacheError, Result};
pub use keys::KeyCodec;
pub use local::{LocalStore, SharedLocalStore};
pub use service::{CacheService, ClientRegistry, SharedClient};
pub use tasks::spawn_cleanup_task;
