//! Error types for the cache client
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache client.
///
/// Only [`CacheError::TransientConnection`] is ever retried by the connection
/// manager; every other kind surfaces on the first occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Empty key, out-of-range database index, malformed configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No database selected yet, or a required dependency is unavailable
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Recoverable connect or command failure (network drop, timeout)
    #[error("Transient connection failure: {0}")]
    TransientConnection(String),

    /// Definitive failure reported by the remote store
    #[error("Remote store failure: {0}")]
    RemoteFailure(String),
}

impl CacheError {
    /// Returns true when the retry policy may attempt the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::TransientConnection(_))
    }
}

// == Redis Error Classification ==
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
        {
            CacheError::TransientConnection(err.to_string())
        } else {
            CacheError::RemoteFailure(err.to_string())
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache client.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Gateway Error ==
/// Errors returned by the HTTP gateway handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key absent in both cache layers
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Failure bubbled up from the client
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Blocking task panicked or the client lock was poisoned
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Cache(CacheError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::NotInitialized(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Cache(CacheError::TransientConnection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cache(CacheError::RemoteFailure(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(CacheError::TransientConnection("reset".into()).is_transient());
        assert!(!CacheError::RemoteFailure("WRONGTYPE".into()).is_transient());
        assert!(!CacheError::InvalidArgument("empty key".into()).is_transient());
        assert!(!CacheError::NotInitialized("no db".into()).is_transient());
    }

    #[test]
    fn test_redis_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: CacheError = redis::RedisError::from(io).into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_redis_type_error_is_remote_failure() {
        let err: CacheError =
            redis::RedisError::from((redis::ErrorKind::TypeError, "bad reply")).into();
        assert!(matches!(err, CacheError::RemoteFailure(_)));
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (
                ApiError::Cache(CacheError::InvalidArgument("k".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Cache(CacheError::TransientConnection("k".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Cache(CacheError::RemoteFailure("k".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
