//! Catalog Cache - TTL fetch-through cache for a course catalog API
//!
//! Serves catalog reads (categories, cities, courses, search, blogs, sitemap,
//! SEO) from an in-memory TTL cache with single-flight loading, bulk
//! invalidation, preloading and retrying upstream calls.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod tasks;

pub use api::AppState;
pub use cache::{build_key, Cache, CacheStats, Invalidation};
pub use catalog::{CatalogClient, Endpoint};
pub use config::{Config, FetchOptions};
pub use error::FetchError;
pub use retry::{with_retry, with_timeout, RetryPolicy};
pub use tasks::spawn_cleanup_task;
