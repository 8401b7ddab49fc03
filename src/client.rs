//! Cache Client
//!
//! The public entry point: a remote-store client fronted by the local cache.
//!
//! # Consistency protocol
//! - `get` serves local hits and negative entries without a round-trip, and
//!   writes every remote answer back (negative entry for "not found").
//! - `set` invalidates locally before the remote write, and repopulates the
//!   local entry only once the remote write succeeded.
//! - `delete` and `clear` invalidate locally first, then remotely.
//! - `expire` mirrors an accepted TTL into the local entry and drops the
//!   local entry whenever the remote store did not accept it.
//! - `has` and the hash commands go to the remote store only.

use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::error::{CacheError, Result};
use crate::keys::KeyCodec;
use crate::local::{
    CacheStats, LocalCacheLayer, LocalStore, Lookup, SharedLocalStore, MAX_TTL_SECONDS,
};
use crate::remote::{Command, Connector, RedisConnector, Reply};

// == Cache Client ==
pub struct CacheClient<C: Connector = RedisConnector> {
    connections: ConnectionManager<C>,
    local: LocalCacheLayer,
    codec: KeyCodec,
    local_ttl: u64,
}

impl CacheClient<RedisConnector> {
    /// Connects lazily to the Redis server described by `config`, with a
    /// private local store.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let connector = RedisConnector::new(&config)?;
        Self::new(config, connector)
    }
}

impl<C: Connector> CacheClient<C> {
    /// Creates a client with its own local store sized by `config`.
    pub fn new(config: ClientConfig, connector: C) -> Result<Self> {
        let store = LocalStore::shared(config.local_capacity.max(1));
        Self::with_store(config, connector, store)
    }

    /// Creates a client writing into a local store shared with other clients.
    pub fn with_store(config: ClientConfig, connector: C, store: SharedLocalStore) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            connections: ConnectionManager::new(connector, &config),
            local: LocalCacheLayer::new(store, config.local_prefix.clone()),
            codec: KeyCodec::new(&config.local_prefix),
            local_ttl: config.local_ttl,
        })
    }

    // == Database Selection ==
    /// Selects the database (0..=15) used by every following call.
    pub fn select(&mut self, index: i64) -> Result<()> {
        self.connections.select_database(index).map(|_| ())
    }

    pub fn current_db(&self) -> Option<u8> {
        self.connections.current_db()
    }

    // == Get ==
    /// Returns the value of `key`, `None` when the remote store has none.
    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        let local_key = self.prepare(key)?;

        if let Some(k) = &local_key {
            match self.local.get(k) {
                Lookup::Hit(value) => {
                    debug!(key, "local hit");
                    return Ok(Some(value));
                }
                Lookup::Absent => {
                    debug!(key, "local negative hit");
                    return Ok(None);
                }
                Lookup::Miss => {}
            }
        }

        let value = self
            .connections
            .execute(&Command::Get { key: key.to_string() })?
            .into_string()?;

        if let Some(k) = &local_key {
            match &value {
                Some(v) => self.local.set(k, v, self.local_ttl),
                None => self.local.set_absent(k, self.local_ttl),
            }
        }

        Ok(value)
    }

    /// Like [`get`](Self::get), substituting `default` for a missing key.
    pub fn get_or(&mut self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    // == Set ==
    /// Stores `value` under `key`; `ttl` in seconds, 0 for no expiry.
    ///
    /// Returns whether the remote store acknowledged the write.
    pub fn set(&mut self, key: &str, value: &str, ttl: u64) -> Result<bool> {
        let local_key = self.prepare(key)?;
        check_ttl(ttl)?;
        if let Some(k) = &local_key {
            self.local.delete(k);
        }

        let command = if ttl == 0 {
            Command::Set {
                key: key.to_string(),
                value: value.to_string(),
            }
        } else {
            Command::SetEx {
                key: key.to_string(),
                ttl,
                value: value.to_string(),
            }
        };
        let stored = self.connections.execute(&command)?.is_ok();

        if stored {
            if let Some(k) = &local_key {
                self.local.set(k, value, ttl);
            }
        }
        Ok(stored)
    }

    /// Caches "no value" for `key` locally for `ttl` seconds, without
    /// writing to the remote store.
    pub fn set_absent(&mut self, key: &str, ttl: u64) -> Result<bool> {
        let local_key = self.prepare(key)?;
        check_ttl(ttl)?;
        if let Some(k) = local_key {
            self.local.delete(&k);
            self.local.set_absent(&k, ttl);
        }
        Ok(true)
    }

    // == Delete ==
    /// Removes `key` from both layers; returns the number of remote keys removed.
    pub fn delete(&mut self, key: &str) -> Result<u64> {
        if let Some(k) = self.prepare(key)? {
            self.local.delete(&k);
        }

        let removed = self
            .connections
            .execute(&Command::Del { key: key.to_string() })?
            .as_int()?;
        Ok(u64::try_from(removed).unwrap_or(0))
    }

    // == Expire ==
    /// Gives `key` a TTL of `seconds`; returns false when the key is missing.
    pub fn expire(&mut self, key: &str, seconds: u64) -> Result<bool> {
        let local_key = self.prepare(key)?;
        if seconds == 0 {
            return Err(CacheError::InvalidArgument(
                "expire requires a positive ttl".to_string(),
            ));
        }
        check_ttl(seconds)?;

        let applied = self
            .connections
            .execute(&Command::Expire {
                key: key.to_string(),
                seconds,
            })
            .and_then(|reply| reply.as_int());

        match (&local_key, &applied) {
            (Some(k), Ok(1)) => self.local.refresh_ttl(k, seconds),
            (Some(k), _) => self.local.delete(k),
            (None, _) => {}
        }

        Ok(applied? == 1)
    }

    // == Clear ==
    /// Empties this client's local namespace, then the selected remote database.
    pub fn clear(&mut self) -> Result<()> {
        self.require_db()?;
        self.local.clear();
        self.connections.execute(&Command::FlushDb)?;
        Ok(())
    }

    // == Has ==
    /// Remote existence check; never consults the local cache.
    pub fn has(&mut self, key: &str) -> Result<bool> {
        self.prepare(key)?;
        let count = self
            .connections
            .execute(&Command::Exists { key: key.to_string() })?
            .as_int()?;
        Ok(count > 0)
    }

    // == Pass-through ==
    /// Runs a hash-map command by name, e.g. `command("HGET", &["h", "f"])`.
    ///
    /// Unsupported names are rejected with `InvalidArgument`.
    pub fn command(&mut self, name: &str, args: &[&str]) -> Result<Reply> {
        let command = Command::parse(name, args)?;
        self.require_db()?;
        self.connections.execute(&command)
    }

    pub fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        let added = self.pass_through(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })?;
        Ok(added.as_int()? == 1)
    }

    pub fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        self.pass_through(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })?
        .into_string()
    }

    pub fn hmset(&mut self, key: &str, pairs: &[(&str, &str)]) -> Result<bool> {
        if pairs.is_empty() {
            return Err(CacheError::InvalidArgument("HMSET requires fields".to_string()));
        }
        let reply = self.pass_through(Command::HMSet {
            key: key.to_string(),
            pairs: pairs
                .iter()
                .map(|(f, v)| (f.to_string(), v.to_string()))
                .collect(),
        })?;
        Ok(reply.is_ok())
    }

    pub fn hmget(&mut self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        if fields.is_empty() {
            return Err(CacheError::InvalidArgument("HMGET requires fields".to_string()));
        }
        self.pass_through(Command::HMGet {
            key: key.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        })?
        .into_list()
    }

    pub fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>> {
        self.pass_through(Command::HGetAll { key: key.to_string() })?
            .into_pairs()
    }

    pub fn hdel(&mut self, key: &str, fields: &[&str]) -> Result<u64> {
        if fields.is_empty() {
            return Err(CacheError::InvalidArgument("HDEL requires fields".to_string()));
        }
        let removed = self
            .pass_through(Command::HDel {
                key: key.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            })?
            .as_int()?;
        Ok(u64::try_from(removed).unwrap_or(0))
    }

    // == Local Cache Settings ==
    /// TTL in seconds applied to entries written back after a remote read.
    pub fn local_ttl(&self) -> u64 {
        self.local_ttl
    }

    /// Changes the write-back TTL; zero or anything above
    /// [`MAX_TTL_SECONDS`] is refused.
    pub fn set_local_ttl(&mut self, seconds: u64) -> bool {
        if seconds == 0 || seconds > MAX_TTL_SECONDS {
            return false;
        }
        self.local_ttl = seconds;
        true
    }

    pub fn local_enabled(&self) -> bool {
        self.local.is_enabled()
    }

    pub fn local_stats(&self) -> Option<CacheStats> {
        self.local.stats()
    }

    /// Full local-store key for `key` in the selected database.
    pub fn local_key(&self, key: &str) -> Option<String> {
        let db = self.current_db()?;
        let bounded = self.codec.encode(db, key)?;
        Some(format!("{}{}", self.local.prefix(), bounded))
    }

    // == Connections ==
    /// Replaces the session for database `index`; false when none was open.
    pub fn reconnect(&mut self, index: i64) -> Result<bool> {
        self.connections.reconnect(index)
    }

    /// Closes every remote session. Later calls reconnect lazily.
    pub fn close(&mut self) {
        self.connections.close_all();
    }

    fn pass_through(&mut self, command: Command) -> Result<Reply> {
        command.validate()?;
        self.require_db()?;
        self.connections.execute(&command)
    }

    fn require_db(&self) -> Result<u8> {
        self.current_db()
            .ok_or_else(|| CacheError::NotInitialized("no database selected".to_string()))
    }

    /// Validates `key` and returns its local key, if the local layer is on.
    fn prepare(&self, key: &str) -> Result<Option<String>> {
        if key.is_empty() {
            return Err(CacheError::InvalidArgument("key must not be empty".to_string()));
        }
        let db = self.require_db()?;
        Ok(self.codec.encode(db, key))
    }
}

fn check_ttl(ttl: u64) -> Result<()> {
    if ttl > MAX_TTL_SECONDS {
        return Err(CacheError::InvalidArgument(format!(
            "ttl {} exceeds {} seconds",
            ttl, MAX_TTL_SECONDS
        )));
    }
    Ok(())
}
