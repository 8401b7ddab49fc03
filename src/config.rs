//! Configuration Module
//!
//! Client and gateway configuration, loadable from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::keys::MAX_PREFIX_LENGTH;
use crate::local::MAX_TTL_SECONDS;

/// Connection and local-cache parameters for one [`CacheClient`](crate::CacheClient).
///
/// Captured at construction and never mutated by the client afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Remote store host, must be non-empty
    pub host: String,
    /// Remote store port
    pub port: u16,
    /// Connect timeout, zero means no timeout
    pub connect_timeout: Duration,
    /// Read timeout, zero means no timeout
    pub read_timeout: Duration,
    /// Pause between attempts after a transient failure
    pub retry_interval: Duration,
    /// Total attempts per operation, the first one included
    pub max_retry: u32,
    /// Legacy connect flag, only honoured when `retry_interval` is zero
    pub reserved: u64,
    /// Local cache namespace, empty disables the local layer
    pub local_prefix: String,
    /// TTL in seconds for entries written back after a remote read
    pub local_ttl: u64,
    /// Capacity of the local store when the client creates its own
    pub local_capacity: usize,
}

impl ClientConfig {
    /// Creates a configuration for `host` with every other field defaulted.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 6379,
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(3),
            retry_interval: Duration::from_millis(500),
            max_retry: 3,
            reserved: 0,
            local_prefix: String::new(),
            local_ttl: 60,
            local_capacity: 1000,
        }
    }

    /// Sets the local cache namespace; an empty prefix disables the local layer.
    pub fn with_local_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.local_prefix = prefix.into();
        self
    }

    /// Sets the pause between retry attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the total attempt budget per operation.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Creates a new ClientConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_HOST` - Remote host (default: 127.0.0.1)
    /// - `REDIS_PORT` - Remote port (default: 6379)
    /// - `REDIS_CONNECT_TIMEOUT_MS` - Connect timeout (default: 3000)
    /// - `REDIS_READ_TIMEOUT_MS` - Read timeout (default: 3000)
    /// - `REDIS_RETRY_INTERVAL_MS` - Retry pause (default: 500)
    /// - `REDIS_MAX_RETRY` - Attempts per operation (default: 3)
    /// - `REDIS_RESERVED` - Legacy connect flag (default: 0)
    /// - `LOCAL_CACHE_PREFIX` - Local namespace, empty disables (default: empty)
    /// - `LOCAL_CACHE_TTL` - Local write-back TTL in seconds (default: 60)
    /// - `LOCAL_CACHE_CAPACITY` - Local store capacity (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::new("127.0.0.1");
        Self {
            host: env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: env_or("REDIS_PORT", defaults.port),
            connect_timeout: Duration::from_millis(env_or("REDIS_CONNECT_TIMEOUT_MS", 3000)),
            read_timeout: Duration::from_millis(env_or("REDIS_READ_TIMEOUT_MS", 3000)),
            retry_interval: Duration::from_millis(env_or("REDIS_RETRY_INTERVAL_MS", 500)),
            max_retry: env_or("REDIS_MAX_RETRY", defaults.max_retry),
            reserved: env_or("REDIS_RESERVED", defaults.reserved),
            local_prefix: env::var("LOCAL_CACHE_PREFIX").unwrap_or_default(),
            local_ttl: env_or("LOCAL_CACHE_TTL", defaults.local_ttl),
            local_capacity: env_or("LOCAL_CACHE_CAPACITY", defaults.local_capacity),
        }
    }

    // == Validation ==
    /// Rejects configurations the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CacheError::InvalidArgument("unknown host".to_string()));
        }
        if self.max_retry == 0 {
            return Err(CacheError::InvalidArgument(
                "max_retry must allow at least one attempt".to_string(),
            ));
        }
        if self.local_prefix.len() > MAX_PREFIX_LENGTH {
            return Err(CacheError::InvalidArgument(format!(
                "local cache prefix exceeds {} characters",
                MAX_PREFIX_LENGTH
            )));
        }
        if self.local_enabled() && (self.local_capacity == 0 || self.local_ttl == 0) {
            return Err(CacheError::InvalidArgument(
                "local cache capacity and ttl must be positive".to_string(),
            ));
        }
        if self.local_ttl > MAX_TTL_SECONDS {
            return Err(CacheError::InvalidArgument(format!(
                "local cache ttl exceeds {} seconds",
                MAX_TTL_SECONDS
            )));
        }
        Ok(())
    }

    /// Returns true when a local cache prefix is configured.
    pub fn local_enabled(&self) -> bool {
        !self.local_prefix.is_empty()
    }

    /// The legacy connect flag, present only when retry backoff is disabled.
    pub fn reserved(&self) -> Option<u64> {
        self.retry_interval.is_zero().then_some(self.reserved)
    }
}

/// Gateway server parameters.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Local cache sweep interval in seconds
    pub cleanup_interval: u64,
    /// Database index served by the gateway
    pub db: i64,
}

impl GatewayConfig {
    /// Creates a new GatewayConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `CACHE_DB` - Database index (default: 0)
    pub fn from_env() -> Self {
        Self {
            server_port: env_or("SERVER_PORT", 3000),
            cleanup_interval: env_or("CLEANUP_INTERVAL", 1),
            db: env_or("CACHE_DB", 0),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            db: 0,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
