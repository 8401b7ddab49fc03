//! Redis Backend
//!
//! Blocking sessions to a Redis server through the `redis` driver.

use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Value};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{CacheError, Result};
use crate::remote::{Command, Connector, RemoteConnection, Reply};

// == Connector ==
/// Opens TCP sessions with the timeouts of a [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: redis::Client,
    connect_timeout: Duration,
    read_timeout: Duration,
    reserved: Option<u64>,
}

impl RedisConnector {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo::default(),
        };
        let client = redis::Client::open(info)?;

        Ok(Self {
            client,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            reserved: config.reserved(),
        })
    }
}

impl Connector for RedisConnector {
    type Connection = RedisConnection;

    fn connect(&self) -> Result<RedisConnection> {
        let conn = if self.connect_timeout.is_zero() {
            self.client.get_connection()?
        } else {
            self.client.get_connection_with_timeout(self.connect_timeout)?
        };

        let io_timeout = (!self.read_timeout.is_zero()).then_some(self.read_timeout);
        conn.set_read_timeout(io_timeout)?;
        conn.set_write_timeout(io_timeout)?;

        debug!(
            addr = ?self.client.get_connection_info().addr,
            reserved = ?self.reserved,
            "opened remote session"
        );
        Ok(RedisConnection { conn })
    }
}

// == Connection ==
pub struct RedisConnection {
    conn: redis::Connection,
}

impl RemoteConnection for RedisConnection {
    fn select(&mut self, db: u8) -> Result<()> {
        redis::cmd("SELECT").arg(db).query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Result<Reply> {
        let mut cmd = redis::cmd(command.name());
        for arg in command.args() {
            cmd.arg(arg);
        }
        let value: Value = cmd.query(&mut self.conn)?;
        reply_from_value(value)
    }
}

fn reply_from_value(value: Value) -> Result<Reply> {
    match value {
        Value::Nil => Ok(Reply::Nil),
        Value::Okay => Ok(Reply::Ok),
        Value::Int(n) => Ok(Reply::Int(n)),
        Value::Boolean(b) => Ok(Reply::Int(i64::from(b))),
        Value::SimpleString(s) => Ok(Reply::Data(s)),
        Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(Reply::Data)
            .map_err(|e| CacheError::RemoteFailure(format!("non UTF-8 reply: {}", e))),
        Value::Array(items) | Value::Set(items) => items
            .into_iter()
            .map(reply_from_value)
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        Value::Map(pairs) => pairs
            .into_iter()
            .flat_map(|(field, value)| [field, value])
            .map(reply_from_value)
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        other => Err(CacheError::RemoteFailure(format!(
            "unsupported reply: {:?}",
            other
        ))),
    }
}
