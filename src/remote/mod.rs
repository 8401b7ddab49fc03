//! Remote Store Module
//!
//! Commands, replies and the connection seam to the remote key-value store.
//!
//! # Backends
//! - [`RedisConnector`]: TCP sessions through the `redis` driver
//! - `MemoryConnector`: in-process store with fault injection, built for
//!   tests and with the `test-util` feature

mod command;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod redis_store;
mod reply;

pub use command::Command;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryConnector;
pub use redis_store::RedisConnector;
pub use reply::Reply;

use crate::error::Result;

/// One session to the remote store.
///
/// A fresh session starts on database 0; callers select explicitly.
pub trait RemoteConnection: Send {
    /// Switches the session to database `db`.
    fn select(&mut self, db: u8) -> Result<()>;

    /// Runs `command` against the selected database.
    fn execute(&mut self, command: &Command) -> Result<Reply>;

    /// Releases the session. Called once before the connection is dropped.
    fn close(&mut self) {}
}

/// Opens sessions to the remote store.
pub trait Connector: Send {
    type Connection: RemoteConnection;

    fn connect(&self) -> Result<Self::Connection>;
}
