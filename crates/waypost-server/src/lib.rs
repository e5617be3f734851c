//! Waypost server library logic.

pub mod api_messages;
pub mod api_ws;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use waypost_bus::EventBus;
use waypost_db::DbPool;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// The process-wide event bus (and its subscription registry).
    pub bus: EventBus,
    /// Rate limiter state.
    pub rate_limiter: middleware::RateLimiter,
    /// Allowed message creations per client IP per window.
    pub create_limit: u32,
}

/// Maximum request body size (64 KiB). Message payloads are small;
/// anything larger is abuse.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/messages",
            post(api_messages::create_message_handler).get(api_messages::query_messages_handler),
        )
        .route("/messages/{id}", delete(api_messages::delete_message_handler))
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
