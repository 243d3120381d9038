//! API Handlers
//!
//! HTTP request handlers for cache administration and cached catalog reads.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Cache, Invalidation};
use crate::catalog::{CatalogClient, Endpoint, Filters};
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    KeysResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// Holds the injected cache handle and the catalog client reading through it.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Shared cache handle
    pub cache: Cache,
    /// Upstream catalog client using `cache`
    pub catalog: CatalogClient,
}

impl AppState {
    /// Creates a new AppState around a catalog client.
    pub fn new(catalog: CatalogClient) -> Self {
        Self {
            cache: catalog.cache().clone(),
            catalog,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        let cache = Cache::from_config(config);
        Self::new(CatalogClient::from_config(config, cache))
    }
}

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    Json(StatsResponse::new(&stats, state.cache.in_flight()))
}

/// Handler for GET /cache/keys
pub async fn keys_handler(State(state): State<AppState>) -> Json<KeysResponse> {
    Json(KeysResponse::new(state.cache.keys()))
}

/// Handler for DELETE /cache
///
/// Removes every entry and resets the hit/miss counters.
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.invalidate(Invalidation::All);
    Json(ClearResponse::new(removed))
}

/// Handler for DELETE /cache/keys/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.delete(&key) {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(FetchError::KeyNotFound(key))
    }
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let invalidation = req.into_invalidation()?;
    let removed = state.cache.invalidate(invalidation);
    Ok(Json(InvalidateResponse { removed }))
}

/// Handler for GET /catalog/:endpoint
///
/// Query parameters are passed upstream as filters.
pub async fn catalog_handler(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Query(filters): Query<Filters>,
) -> Result<Json<Value>> {
    let endpoint: Endpoint = endpoint.parse()?;
    let value = state.catalog.fetch(endpoint, None, &filters).await?;
    Ok(Json(Value::clone(&value)))
}

/// Handler for GET /catalog/:endpoint/:slug
pub async fn catalog_item_handler(
    State(state): State<AppState>,
    Path((endpoint, slug)): Path<(String, String)>,
    Query(filters): Query<Filters>,
) -> Result<Json<Value>> {
    let endpoint: Endpoint = endpoint.parse()?;
    let value = state.catalog.fetch(endpoint, Some(&slug), &filters).await?;
    Ok(Json(Value::clone(&value)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
