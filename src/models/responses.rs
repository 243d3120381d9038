//! Response DTOs for the cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /cache/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Current number of entries in cache
    pub size: usize,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries dropped after expiring
    pub expirations: u64,
    /// Hits as a percentage of lookups
    pub hit_rate: f64,
    /// Misses as a percentage of lookups
    pub miss_rate: f64,
    /// Loads currently running
    pub in_flight: usize,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(stats: &CacheStats, in_flight: usize) -> Self {
        Self {
            size: stats.size,
            hits: stats.hits,
            misses: stats.misses,
            expirations: stats.expirations,
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            in_flight,
        }
    }
}

/// Response body for the key listing (GET /cache/keys)
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for DELETE /cache/keys/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Entries removed
    pub removed: usize,
}

impl ClearResponse {
    pub fn new(removed: usize) -> Self {
        Self {
            message: "Cache cleared".to_string(),
            removed,
        }
    }
}

/// Response body for POST /cache/invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Entries removed
    pub removed: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
