//! Connection Manager
//!
//! Owns one remote session per database index and runs commands with a
//! bounded retry loop. Sessions are opened lazily on the first command for
//! a database; a transient failure drops the session so the next attempt
//! reconnects and re-selects the database on a fresh one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{CacheError, Result};
use crate::remote::{Command, Connector, RemoteConnection, Reply};

/// Lowest database index accepted by the remote store
pub const DB_INDEX_MIN: i64 = 0;

/// Highest database index accepted by the remote store
pub const DB_INDEX_MAX: i64 = 15;

/// Checks that `index` names one of the remote store's databases.
pub fn validate_db_index(index: i64) -> Result<u8> {
    if !(DB_INDEX_MIN..=DB_INDEX_MAX).contains(&index) {
        return Err(CacheError::InvalidArgument(format!(
            "invalid database index {}, expected {}..={}",
            index, DB_INDEX_MIN, DB_INDEX_MAX
        )));
    }
    u8::try_from(index).map_err(|_| CacheError::InvalidArgument(index.to_string()))
}

// == Connection Manager ==
pub struct ConnectionManager<C: Connector> {
    connector: C,
    connections: HashMap<u8, C::Connection>,
    current_db: Option<u8>,
    retry_interval: Duration,
    max_attempts: u32,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, config: &ClientConfig) -> Self {
        Self {
            connector,
            connections: HashMap::new(),
            current_db: None,
            retry_interval: config.retry_interval,
            max_attempts: config.max_retry.max(1),
        }
    }

    // == Select ==
    /// Makes `index` the target of subsequent commands. Does not connect.
    pub fn select_database(&mut self, index: i64) -> Result<u8> {
        let db = validate_db_index(index)?;
        self.current_db = Some(db);
        Ok(db)
    }

    pub fn current_db(&self) -> Option<u8> {
        self.current_db
    }

    /// Returns true when a session for `db` is open.
    #[cfg(test)]
    pub fn is_connected(&self, db: u8) -> bool {
        self.connections.contains_key(&db)
    }

    #[cfg(test)]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // == Execute ==
    /// Runs `command` against the selected database.
    ///
    /// Transient failures are retried until `max_retry` attempts have been
    /// spent, pausing `retry_interval` between attempts; the last failure is
    /// then returned. Other failures are returned at once.
    pub fn execute(&mut self, command: &Command) -> Result<Reply> {
        let db = self.current_db.ok_or_else(|| {
            CacheError::NotInitialized("no database selected".to_string())
        })?;

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.try_execute(db, command) {
                Ok(reply) => {
                    if attempt > 1 {
                        info!(db, attempt, command = command.name(), "remote store recovered");
                    }
                    return Ok(reply);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        db,
                        attempt,
                        max_attempts = self.max_attempts,
                        command = command.name(),
                        error = %e,
                        "transient remote failure"
                    );
                    self.drop_connection(db);
                    if attempt < self.max_attempts && !self.retry_interval.is_zero() {
                        thread::sleep(self.retry_interval);
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CacheError::TransientConnection("retry budget exhausted".to_string())
        }))
    }

    // == Reconnect ==
    /// Replaces the session for `index` with a fresh, selected one.
    ///
    /// Returns `Ok(false)` when no session was open for that index.
    pub fn reconnect(&mut self, index: i64) -> Result<bool> {
        let db = validate_db_index(index)?;
        if !self.drop_connection(db) {
            return Ok(false);
        }
        let conn = Self::open(&self.connector, db)?;
        self.connections.insert(db, conn);
        Ok(true)
    }

    // == Close ==
    /// Closes every open session. Safe to call repeatedly.
    pub fn close_all(&mut self) {
        for (db, mut conn) in self.connections.drain() {
            conn.close();
            debug!(db, "closed remote session");
        }
    }

    fn try_execute(&mut self, db: u8, command: &Command) -> Result<Reply> {
        let conn = match self.connections.entry(db) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Self::open(&self.connector, db)?),
        };
        conn.execute(command)
    }

    fn open(connector: &C, db: u8) -> Result<C::Connection> {
        let mut conn = connector.connect()?;
        conn.select(db)?;
        debug!(db, "remote session ready");
        Ok(conn)
    }

    fn drop_connection(&mut self, db: u8) -> bool {
        match self.connections.remove(&db) {
            Some(mut conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.close_all();
    }
}
