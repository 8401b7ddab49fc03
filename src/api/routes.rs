//! API Routes
//!
//! Configures the Axum router with all gateway endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, exists_handler, expire_handler, get_handler, health_handler,
    set_handler, stats_handler, AppState,
};
use crate::remote::Connector;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a key-value pair
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Delete a key
/// - `POST /expire` - Set a TTL on an existing key
/// - `GET /exists/:key` - Remote existence check
/// - `POST /clear` - Flush the gateway's database
/// - `GET /stats` - Local cache statistics
/// - `GET /health` - Health check endpoint
pub fn create_router<C: Connector + 'static>(state: AppState<C>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler::<C>))
        .route("/get/:key", get(get_handler::<C>))
        .route("/del/:key", delete(delete_handler::<C>))
        .route("/expire", post(expire_handler::<C>))
        .route("/exists/:key", get(exists_handler::<C>))
        .route("/clear", post(clear_handler::<C>))
        .route("/stats", get(stats_handler::<C>))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
