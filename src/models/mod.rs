//! Request and Response models for the gateway API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{ExpireRequest, SetRequest};
pub use responses::{
    ClearResponse, DeleteResponse, ExistsResponse, ExpireResponse, GetResponse, HealthResponse,
    SetResponse, StatsResponse,
};
