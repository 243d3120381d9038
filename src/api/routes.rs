//! API Routes
//!
//! Configures the Axum router with all endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    catalog_handler, catalog_item_handler, clear_handler, delete_handler, health_handler,
    invalidate_handler, keys_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /cache/stats` - Cache statistics
/// - `GET /cache/keys` - Stored keys
/// - `DELETE /cache` - Clear the cache
/// - `DELETE /cache/keys/:key` - Delete one key
/// - `POST /cache/invalidate` - Bulk invalidation by keys, pattern or endpoints
/// - `GET /catalog/:endpoint` - Cached catalog collection
/// - `GET /catalog/:endpoint/:slug` - Cached catalog item
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/cache", delete(clear_handler))
        .route("/cache/stats", get(stats_handler))
        .route("/cache/keys", get(keys_handler))
        .route("/cache/keys/:key", delete(delete_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/catalog/:endpoint", get(catalog_handler))
        .route("/catalog/:endpoint/:slug", get(catalog_item_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
