//! In-Memory Backend
//!
//! A sixteen-database key-value store living inside the process. It speaks
//! the same command set as the Redis backend and lets callers inject
//! failures and count traffic, which makes the client's retry and caching
//! behaviour observable without a server.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{CacheError, Result};
use crate::remote::{Command, Connector, RemoteConnection, Reply};

const DATABASES: usize = 16;

#[derive(Debug, Clone)]
enum Stored {
    Str(String),
    Hash(BTreeMap<String, String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Slot {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

#[derive(Debug)]
struct MemoryServer {
    dbs: Vec<HashMap<String, Slot>>,
    transient_failures: u32,
    remote_failures: u32,
    connects: u64,
    selects: u64,
    commands: HashMap<&'static str, u64>,
    open_sessions: usize,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self {
            dbs: vec![HashMap::new(); DATABASES],
            transient_failures: 0,
            remote_failures: 0,
            connects: 0,
            selects: 0,
            commands: HashMap::new(),
            open_sessions: 0,
        }
    }
}

impl MemoryServer {
    fn take_transient_failure(&mut self, during: &str) -> Result<()> {
        if self.transient_failures > 0 {
            self.transient_failures -= 1;
            return Err(CacheError::TransientConnection(format!(
                "injected failure during {}",
                during
            )));
        }
        Ok(())
    }

    fn live_slot(&mut self, db: usize, key: &str) -> Option<&mut Slot> {
        let now = Instant::now();
        let table = &mut self.dbs[db];
        if table.get(key).is_some_and(|slot| !slot.live(now)) {
            table.remove(key);
        }
        table.get_mut(key)
    }

    fn hash_mut(&mut self, db: usize, key: &str) -> Result<&mut BTreeMap<String, String>> {
        if self.live_slot(db, key).is_none() {
            self.dbs[db].insert(
                key.to_string(),
                Slot {
                    value: Stored::Hash(BTreeMap::new()),
                    expires_at: None,
                },
            );
        }
        match self.dbs[db].get_mut(key).map(|slot| &mut slot.value) {
            Some(Stored::Hash(map)) => Ok(map),
            _ => Err(wrong_type()),
        }
    }

    fn hash(&mut self, db: usize, key: &str) -> Result<Option<&BTreeMap<String, String>>> {
        match self.live_slot(db, key).map(|slot| &slot.value) {
            None => Ok(None),
            Some(Stored::Hash(map)) => Ok(Some(map)),
            Some(Stored::Str(_)) => Err(wrong_type()),
        }
    }

    fn apply(&mut self, db: usize, command: &Command) -> Result<Reply> {
        match command {
            Command::Get { key } => match self.live_slot(db, key).map(|slot| &slot.value) {
                None => Ok(Reply::Nil),
                Some(Stored::Str(value)) => Ok(Reply::Data(value.clone())),
                Some(Stored::Hash(_)) => Err(wrong_type()),
            },
            Command::Set { key, value } => {
                self.dbs[db].insert(key.clone(), string_slot(value, None));
                Ok(Reply::Ok)
            }
            Command::SetEx { key, ttl, value } => {
                if *ttl == 0 {
                    return Err(CacheError::RemoteFailure(
                        "ERR invalid expire time in 'setex' command".to_string(),
                    ));
                }
                self.dbs[db].insert(key.clone(), string_slot(value, Some(*ttl)));
                Ok(Reply::Ok)
            }
            Command::Del { key } => {
                let existed = self.live_slot(db, key).is_some();
                self.dbs[db].remove(key);
                Ok(Reply::Int(i64::from(existed)))
            }
            Command::Exists { key } => Ok(Reply::Int(i64::from(self.live_slot(db, key).is_some()))),
            Command::Expire { key, seconds } => match self.live_slot(db, key) {
                Some(slot) => {
                    slot.expires_at = deadline(*seconds);
                    Ok(Reply::Int(1))
                }
                None => Ok(Reply::Int(0)),
            },
            Command::FlushDb => {
                self.dbs[db].clear();
                Ok(Reply::Ok)
            }
            Command::HSet { key, field, value } => {
                let map = self.hash_mut(db, key)?;
                let added = map.insert(field.clone(), value.clone()).is_none();
                Ok(Reply::Int(i64::from(added)))
            }
            Command::HGet { key, field } => Ok(self
                .hash(db, key)?
                .and_then(|map| map.get(field))
                .map_or(Reply::Nil, |v| Reply::Data(v.clone()))),
            Command::HMSet { key, pairs } => {
                let map = self.hash_mut(db, key)?;
                for (field, value) in pairs {
                    map.insert(field.clone(), value.clone());
                }
                Ok(Reply::Ok)
            }
            Command::HMGet { key, fields } => {
                let map = self.hash(db, key)?;
                Ok(Reply::Array(
                    fields
                        .iter()
                        .map(|f| {
                            map.and_then(|m| m.get(f))
                                .map_or(Reply::Nil, |v| Reply::Data(v.clone()))
                        })
                        .collect(),
                ))
            }
            Command::HGetAll { key } => Ok(Reply::Array(
                self.hash(db, key)?
                    .into_iter()
                    .flatten()
                    .flat_map(|(f, v)| [Reply::Data(f.clone()), Reply::Data(v.clone())])
                    .collect(),
            )),
            Command::HDel { key, fields } => {
                if self.hash(db, key)?.is_none() {
                    return Ok(Reply::Int(0));
                }
                let map = self.hash_mut(db, key)?;
                let removed = fields.iter().filter(|f| map.remove(*f).is_some()).count();
                if map.is_empty() {
                    self.dbs[db].remove(key);
                }
                Ok(Reply::Int(removed as i64))
            }
        }
    }
}

fn string_slot(value: &str, ttl: Option<u64>) -> Slot {
    Slot {
        value: Stored::Str(value.to_string()),
        expires_at: ttl.and_then(deadline),
    }
}

/// `None` when the deadline is past what `Instant` can represent.
fn deadline(secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(secs))
}

fn wrong_type() -> CacheError {
    CacheError::RemoteFailure(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

// == Connector ==
/// Handle to one in-memory server; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    server: Arc<Mutex<MemoryServer>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` connects or commands fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.lock().transient_failures = count;
    }

    /// Makes the next `count` commands fail with a definitive remote error.
    pub fn reject_next(&self, count: u32) {
        self.lock().remote_failures = count;
    }

    /// Successful session openings so far.
    pub fn connects(&self) -> u64 {
        self.lock().connects
    }

    /// Successful database selections so far.
    pub fn selects(&self) -> u64 {
        self.lock().selects
    }

    /// Times the named command reached the data, e.g. `"GET"`.
    pub fn command_count(&self, name: &str) -> u64 {
        self.lock().commands.get(name).copied().unwrap_or(0)
    }

    /// Total commands that reached the data.
    pub fn total_commands(&self) -> u64 {
        self.lock().commands.values().sum()
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Reads a string key directly, bypassing every client.
    pub fn peek(&self, db: u8, key: &str) -> Option<String> {
        let mut server = self.lock();
        match server.live_slot(usize::from(db), key).map(|slot| &slot.value) {
            Some(Stored::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Writes a string key directly, as another process would.
    pub fn poke(&self, db: u8, key: &str, value: &str) {
        self.lock().dbs[usize::from(db)].insert(key.to_string(), string_slot(value, None));
    }

    fn lock(&self) -> MutexGuard<'_, MemoryServer> {
        // A panicking test thread must not take the fake server down with it.
        self.server
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection> {
        let mut server = self.lock();
        server.take_transient_failure("connect")?;
        server.connects += 1;
        server.open_sessions += 1;
        Ok(MemoryConnection {
            server: self.clone(),
            db: 0,
            open: true,
        })
    }
}

// == Connection ==
#[derive(Debug)]
pub struct MemoryConnection {
    server: MemoryConnector,
    db: u8,
    open: bool,
}

impl RemoteConnection for MemoryConnection {
    fn select(&mut self, db: u8) -> Result<()> {
        if usize::from(db) >= DATABASES {
            return Err(CacheError::RemoteFailure("ERR DB index is out of range".to_string()));
        }
        let mut server = self.server.lock();
        server.take_transient_failure("select")?;
        server.selects += 1;
        self.db = db;
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Result<Reply> {
        if !self.open {
            return Err(CacheError::TransientConnection("session closed".to_string()));
        }
        let mut server = self.server.lock();
        server.take_transient_failure(command.name())?;
        if server.remote_failures > 0 {
            server.remote_failures -= 1;
            return Err(CacheError::RemoteFailure(format!(
                "ERR injected rejection of {}",
                command.name()
            )));
        }
        *server.commands.entry(command.name()).or_insert(0) += 1;
        server.apply(usize::from(self.db), command)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut server = self.server.lock();
            server.open_sessions = server.open_sessions.saturating_sub(1);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(connector: &MemoryConnector, db: u8) -> MemoryConnection {
        let mut conn = connector.connect().unwrap();
        conn.select(db).unwrap();
        conn
    }

    #[test]
    fn test_string_commands() {
        let connector = MemoryConnector::new();
        let mut conn = session(&connector, 2);

        let set = Command::Set { key: "k".into(), value: "0".into() };
        assert_eq!(conn.execute(&set).unwrap(), Reply::Ok);
        assert_eq!(
            conn.execute(&Command::Get { key: "k".into() }).unwrap(),
            Reply::Data("0".into())
        );
        assert_eq!(conn.execute(&Command::Exists { key: "k".into() }).unwrap(), Reply::Int(1));
        assert_eq!(conn.execute(&Command::Del { key: "k".into() }).unwrap(), Reply::Int(1));
        assert_eq!(conn.execute(&Command::Get { key: "k".into() }).unwrap(), Reply::Nil);

        assert_eq!(connector.command_count("GET"), 2);
        assert_eq!(connector.peek(2, "k"), None);
    }

    #[test]
    fn test_databases_are_isolated() {
        let connector = MemoryConnector::new();
        connector.poke(1, "k", "one");

        let mut conn = session(&connector, 0);
        assert_eq!(conn.execute(&Command::Get { key: "k".into() }).unwrap(), Reply::Nil);

        conn.select(1).unwrap();
        assert_eq!(
            conn.execute(&Command::Get { key: "k".into() }).unwrap(),
            Reply::Data("one".into())
        );
        assert!(conn.select(16).is_err());
    }

    #[test]
    fn test_setex_expires() {
        let connector = MemoryConnector::new();
        let mut conn = session(&connector, 0);

        let cmd = Command::SetEx { key: "k".into(), ttl: 1, value: "v".into() };
        conn.execute(&cmd).unwrap();
        assert_eq!(connector.peek(0, "k").as_deref(), Some("v"));

        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(connector.peek(0, "k"), None);
    }

    #[test]
    fn test_huge_ttl_means_no_expiry() {
        let connector = MemoryConnector::new();
        let mut conn = session(&connector, 0);

        let cmd = Command::SetEx { key: "k".into(), ttl: u64::MAX, value: "v".into() };
        assert_eq!(conn.execute(&cmd).unwrap(), Reply::Ok);
        let cmd = Command::Expire { key: "k".into(), seconds: u64::MAX };
        assert_eq!(conn.execute(&cmd).unwrap(), Reply::Int(1));

        assert_eq!(connector.peek(0, "k").as_deref(), Some("v"));
    }

    #[test]
    fn test_hash_commands() {
        let connector = MemoryConnector::new();
        let mut conn = session(&connector, 0);

        let hmset = Command::parse("HMSET", &["h", "a", "1", "b", "2"]).unwrap();
        assert_eq!(conn.execute(&hmset).unwrap(), Reply::Ok);

        let all = conn.execute(&Command::HGetAll { key: "h".into() }).unwrap();
        assert_eq!(
            all.into_pairs().unwrap(),
            vec![("a".into(), "1".into()), ("b".into(), "2".into())]
        );

        let hdel = Command::parse("HDEL", &["h", "a", "b", "c"]).unwrap();
        assert_eq!(conn.execute(&hdel).unwrap(), Reply::Int(2));
        assert_eq!(conn.execute(&Command::Exists { key: "h".into() }).unwrap(), Reply::Int(0));
    }

    #[test]
    fn test_wrong_type() {
        let connector = MemoryConnector::new();
        connector.poke(0, "s", "plain");
        let mut conn = session(&connector, 0);

        let err = conn
            .execute(&Command::HGet { key: "s".into(), field: "f".into() })
            .unwrap_err();
        assert!(matches!(err, CacheError::RemoteFailure(_)));
    }

    #[test]
    fn test_fault_injection() {
        let connector = MemoryConnector::new();
        connector.fail_next(1);
        assert!(matches!(
            connector.connect(),
            Err(CacheError::TransientConnection(_))
        ));

        let mut conn = session(&connector, 0);
        connector.reject_next(1);
        assert!(matches!(
            conn.execute(&Command::FlushDb),
            Err(CacheError::RemoteFailure(_))
        ));
        assert!(conn.execute(&Command::FlushDb).is_ok());
    }

    #[test]
    fn test_session_accounting() {
        let connector = MemoryConnector::new();
        let conn = session(&connector, 0);
        assert_eq!(connector.open_sessions(), 1);
        drop(conn);
        assert_eq!(connector.open_sessions(), 0);
    }
}
