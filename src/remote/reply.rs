//! Remote Replies

use crate::error::{CacheError, Result};

/// A reply from the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Ok,
    Int(i64),
    Data(String),
    Array(Vec<Reply>),
}

impl Reply {
    /// `Nil` becomes `None`; scalars become their string form.
    pub fn into_string(self) -> Result<Option<String>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Ok => Ok(Some("OK".to_string())),
            Reply::Int(n) => Ok(Some(n.to_string())),
            Reply::Data(s) => Ok(Some(s)),
            other @ Reply::Array(_) => Err(unexpected("a scalar", &other)),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Reply::Int(n) => Ok(*n),
            other => Err(unexpected("an integer", other)),
        }
    }

    /// True for status replies acknowledging a write.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok) || matches!(self, Reply::Data(s) if s == "OK")
    }

    /// Element-wise [`Reply::into_string`] over an array reply.
    pub fn into_list(self) -> Result<Vec<Option<String>>> {
        match self {
            Reply::Array(items) => items.into_iter().map(Reply::into_string).collect(),
            other => Err(unexpected("an array", &other)),
        }
    }

    /// Pairs up a flat `field, value, field, value` array reply.
    pub fn into_pairs(self) -> Result<Vec<(String, String)>> {
        let items = self.into_list()?;
        if items.len() % 2 != 0 {
            return Err(CacheError::RemoteFailure(
                "odd number of elements in field/value reply".to_string(),
            ));
        }

        items
            .chunks(2)
            .map(|pair| match (&pair[0], &pair[1]) {
                (Some(field), Some(value)) => Ok((field.clone(), value.clone())),
                _ => Err(CacheError::RemoteFailure(
                    "nil inside field/value reply".to_string(),
                )),
            })
            .collect()
    }
}

fn unexpected(wanted: &str, got: &Reply) -> CacheError {
    CacheError::RemoteFailure(format!("expected {} reply, got {:?}", wanted, got))
}
