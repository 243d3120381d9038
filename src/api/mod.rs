//! API Module
//!
//! HTTP handlers and routing for cache administration and cached catalog reads.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /cache/stats`, `GET /cache/keys` - Cache inspection
//! - `DELETE /cache`, `DELETE /cache/keys/:key`, `POST /cache/invalidate` - Invalidation
//! - `GET /catalog/:endpoint[/:slug]` - Catalog resources served through the cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
