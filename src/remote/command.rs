//! Remote Commands
//!
//! The closed set of commands the client sends to the remote store.

use crate::error::{CacheError, Result};

/// A remote-store command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    SetEx { key: String, ttl: u64, value: String },
    Del { key: String },
    Exists { key: String },
    Expire { key: String, seconds: u64 },
    FlushDb,
    HSet { key: String, field: String, value: String },
    HGet { key: String, field: String },
    HMSet { key: String, pairs: Vec<(String, String)> },
    HMGet { key: String, fields: Vec<String> },
    HGetAll { key: String },
    HDel { key: String, fields: Vec<String> },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::SetEx { .. } => "SETEX",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Expire { .. } => "EXPIRE",
            Command::FlushDb => "FLUSHDB",
            Command::HSet { .. } => "HSET",
            Command::HGet { .. } => "HGET",
            Command::HMSet { .. } => "HMSET",
            Command::HMGet { .. } => "HMGET",
            Command::HGetAll { .. } => "HGETALL",
            Command::HDel { .. } => "HDEL",
        }
    }

    /// Arguments in wire order.
    pub fn args(&self) -> Vec<String> {
        match self {
            Command::Get { key }
            | Command::Del { key }
            | Command::Exists { key }
            | Command::HGetAll { key } => vec![key.clone()],
            Command::Set { key, value } => vec![key.clone(), value.clone()],
            Command::SetEx { key, ttl, value } => {
                vec![key.clone(), ttl.to_string(), value.clone()]
            }
            Command::Expire { key, seconds } => vec![key.clone(), seconds.to_string()],
            Command::FlushDb => Vec::new(),
            Command::HSet { key, field, value } => {
                vec![key.clone(), field.clone(), value.clone()]
            }
            Command::HGet { key, field } => vec![key.clone(), field.clone()],
            Command::HMSet { key, pairs } => std::iter::once(key.clone())
                .chain(pairs.iter().flat_map(|(f, v)| [f.clone(), v.clone()]))
                .collect(),
            Command::HMGet { key, fields } | Command::HDel { key, fields } => {
                std::iter::once(key.clone()).chain(fields.iter().cloned()).collect()
            }
        }
    }

    /// Parses a pass-through command; only the hash-map family is accepted.
    ///
    /// Names are case-insensitive. Anything outside the family, or with the
    /// wrong number of arguments, is rejected with `InvalidArgument`.
    pub fn parse(name: &str, args: &[&str]) -> Result<Command> {
        let command = match (name.to_ascii_uppercase().as_str(), args) {
            ("HSET", [key, field, value]) => Command::HSet {
                key: key.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            },
            ("HGET", [key, field]) => Command::HGet {
                key: key.to_string(),
                field: field.to_string(),
            },
            ("HMSET", [key, rest @ ..]) if !rest.is_empty() && rest.len() % 2 == 0 => {
                Command::HMSet {
                    key: key.to_string(),
                    pairs: rest
                        .chunks(2)
                        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
                        .collect(),
                }
            }
            ("HMGET", [key, fields @ ..]) if !fields.is_empty() => Command::HMGet {
                key: key.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
            ("HGETALL", [key]) => Command::HGetAll {
                key: key.to_string(),
            },
            ("HDEL", [key, fields @ ..]) if !fields.is_empty() => Command::HDel {
                key: key.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
            ("HSET" | "HGET" | "HMSET" | "HMGET" | "HGETALL" | "HDEL", _) => {
                return Err(CacheError::InvalidArgument(format!(
                    "wrong number of arguments for {}",
                    name
                )))
            }
            _ => {
                return Err(CacheError::InvalidArgument(format!(
                    "unsupported command: {}",
                    name
                )))
            }
        };

        command.validate()?;
        Ok(command)
    }

    /// The key the command applies to, `None` for database-wide commands.
    pub fn key(&self) -> Option<&str> {
        match self {
            Command::FlushDb => None,
            Command::Get { key }
            | Command::Set { key, .. }
            | Command::SetEx { key, .. }
            | Command::Del { key }
            | Command::Exists { key }
            | Command::Expire { key, .. }
            | Command::HSet { key, .. }
            | Command::HGet { key, .. }
            | Command::HMSet { key, .. }
            | Command::HMGet { key, .. }
            | Command::HGetAll { key }
            | Command::HDel { key, .. } => Some(key),
        }
    }

    /// Rejects empty keys.
    pub fn validate(&self) -> Result<()> {
        match self.key() {
            Some("") => Err(CacheError::InvalidArgument(format!(
                "{} requires a non-empty key",
                self.name()
            ))),
            _ => Ok(()),
        }
    }
}
