//! API Module
//!
//! HTTP gateway exposing one cache client over a REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /expire` - Set a TTL on an existing key
//! - `GET /exists/:key` - Remote existence check
//! - `POST /clear` - Flush the gateway's database
//! - `GET /stats` - Local cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
