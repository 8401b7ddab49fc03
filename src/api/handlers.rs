//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint. Client calls block on
//! remote I/O, so every handler runs them on the blocking thread pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::client::CacheClient;
use crate::error::{ApiError, CacheError};
use crate::models::{
    ClearResponse, DeleteResponse, ExistsResponse, ExpireRequest, ExpireResponse, GetResponse,
    HealthResponse, SetRequest, SetResponse, StatsResponse,
};
use crate::remote::Connector;
use crate::service::SharedClient;

/// Application state shared across all handlers.
pub struct AppState<C: Connector> {
    /// Client serving every request
    pub client: SharedClient<C>,
    /// Database index the gateway reads and writes
    pub db: i64,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            db: self.db,
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(client: SharedClient<C>, db: i64) -> Self {
        Self { client, db }
    }

    /// Runs `op` against the client on the blocking pool, after selecting
    /// the gateway's database.
    async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        C: 'static,
        T: Send + 'static,
        F: FnOnce(&mut CacheClient<C>) -> crate::error::Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let db = self.db;

        tokio::task::spawn_blocking(move || {
            let mut guard = client
                .lock()
                .map_err(|_| ApiError::Internal("cache client lock poisoned".to_string()))?;
            guard.select(db)?;
            op(&mut *guard).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    }
}

/// Handler for PUT /set
pub async fn set_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>, ApiError> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg).into());
    }

    let key = req.key.clone();
    let stored = state
        .run(move |client| client.set(&req.key, &req.value, req.ttl.unwrap_or(0)))
        .await?;

    if !stored {
        return Err(CacheError::RemoteFailure(format!("write of '{}' not acknowledged", key)).into());
    }
    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /get/:key
pub async fn get_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>, ApiError> {
    let lookup = key.clone();
    match state.run(move |client| client.get(&lookup)).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(ApiError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let target = key.clone();
    let removed = state.run(move |client| client.delete(&target)).await?;

    if removed == 0 {
        return Err(ApiError::NotFound(key));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /expire
pub async fn expire_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
    Json(req): Json<ExpireRequest>,
) -> Result<Json<ExpireResponse>, ApiError> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg).into());
    }

    let ExpireRequest { key, seconds } = req;
    let target = key.clone();
    let applied = state
        .run(move |client| client.expire(&target, seconds))
        .await?;

    if !applied {
        return Err(ApiError::NotFound(key));
    }
    Ok(Json(ExpireResponse { key, seconds }))
}

/// Handler for GET /exists/:key
pub async fn exists_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>, ApiError> {
    let target = key.clone();
    let exists = state.run(move |client| client.has(&target)).await?;
    Ok(Json(ExistsResponse { key, exists }))
}

/// Handler for POST /clear
pub async fn clear_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
) -> Result<Json<ClearResponse>, ApiError> {
    state.run(|client| client.clear()).await?;
    Ok(Json(ClearResponse {
        message: format!("Database {} cleared", state.db),
        db: state.db,
    }))
}

/// Handler for GET /stats
pub async fn stats_handler<C: Connector + 'static>(
    State(state): State<AppState<C>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.run(|client| Ok(client.local_stats())).await?;
    Ok(Json(StatsResponse::from_stats(stats)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
