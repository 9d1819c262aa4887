//! Axum HTTP surface for the gateway.
//!
//! - `handlers`: health, metrics, resolution and cache administration endpoints.
//! - `middleware`: request id and request metrics layers.
//! - `routes`: router assembly with the nested rate limit presets.

mod handlers;
mod middleware;
mod routes;

pub use handlers::ApiResponse;
pub use routes::{create_router, AppState};
