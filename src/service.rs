//! Client Registry and Cache Service
//!
//! [`ClientRegistry`] keeps one shared client per connection name, created
//! explicitly and handed out by the caller that owns the registry.
//! [`CacheService`] is the application-facing facade: it pins a database and
//! a key prefix, and turns client errors into logged `false`/`None` results
//! for callers that prefer degraded answers over failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::client::CacheClient;
use crate::error::{CacheError, Result};
use crate::remote::{Connector, Reply};

/// A client shared between services and request handlers.
pub type SharedClient<C> = Arc<Mutex<CacheClient<C>>>;

// == Client Registry ==
pub struct ClientRegistry<C: Connector> {
    clients: HashMap<String, SharedClient<C>>,
}

impl<C: Connector> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }
}

impl<C: Connector> ClientRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the client built by `build` under `name`.
    ///
    /// When `name` is already registered the existing client is returned and
    /// `build` is not called.
    pub fn get_or_register<F>(&mut self, name: &str, build: F) -> Result<SharedClient<C>>
    where
        F: FnOnce() -> Result<CacheClient<C>>,
    {
        if let Some(client) = self.clients.get(name) {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(Mutex::new(build()?));
        self.clients.insert(name.to_string(), Arc::clone(&client));
        info!(connection = name, "registered cache client");
        Ok(client)
    }

    pub fn get(&self, name: &str) -> Option<SharedClient<C>> {
        self.clients.get(name).cloned()
    }

    /// Removes `name` and closes its sessions once no other handle uses them.
    pub fn remove(&mut self, name: &str) -> Option<SharedClient<C>> {
        let client = self.clients.remove(name)?;
        if let Ok(mut guard) = client.lock() {
            guard.close();
        }
        Some(client)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// == Cache Service ==
/// Facade binding a client to one database and key prefix.
pub struct CacheService<C: Connector> {
    client: SharedClient<C>,
    db: i64,
    prefix: String,
}

impl<C: Connector> Clone for CacheService<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            db: self.db,
            prefix: self.prefix.clone(),
        }
    }
}

impl<C: Connector> CacheService<C> {
    pub fn new(client: SharedClient<C>, db: i64, prefix: impl Into<String>) -> Self {
        Self {
            client,
            db,
            prefix: prefix.into(),
        }
    }

    pub fn client(&self) -> &SharedClient<C> {
        &self.client
    }

    pub fn set_value(&self, key: &str, value: &str, ttl: u64) -> bool {
        let key = self.key(key);
        self.run("set", |client| client.set(&key, value, ttl))
            .unwrap_or(false)
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        let key = self.key(key);
        self.run("get", |client| client.get(&key)).flatten()
    }

    pub fn get_value_or(&self, key: &str, default: &str) -> String {
        self.get_value(key).unwrap_or_else(|| default.to_string())
    }

    pub fn delete_key(&self, key: &str) -> bool {
        let key = self.key(key);
        self.run("delete", |client| client.delete(&key)).is_some()
    }

    /// Runs a hash-map command on a prefixed key, e.g. `call("HGET", "h", &["f"])`.
    pub fn call(&self, name: &str, key: &str, args: &[&str]) -> Option<Reply> {
        let key = self.key(key);
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(key.as_str());
        full_args.extend_from_slice(args);
        self.run(name, |client| client.command(name, &full_args))
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn run<T>(&self, op: &str, f: impl FnOnce(&mut CacheClient<C>) -> Result<T>) -> Option<T> {
        let result = match self.client.lock() {
            Ok(mut client) => client.select(self.db).and_then(|_| f(&mut client)),
            Err(_) => Err(CacheError::NotInitialized(
                "cache client lock poisoned".to_string(),
            )),
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!(op, db = self.db, prefix = %self.prefix, error = %e, "cache operation failed");
                None
            }
        }
    }
}
