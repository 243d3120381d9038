//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables,
//! and the per-call fetch options handed to the cache.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};

/// TTL for general reference data (categories, cities, details, sitemap, SEO)
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// TTL for volatile search-style results
pub const SEARCH_TTL: Duration = Duration::from_millis(60_000);

/// Interval of the background expiry sweep
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

// == Fetch Options ==
/// Per-call caching and retry settings. Every field can be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Serve from and populate the cache
    pub enable_cache: bool,
    /// TTL of the entry written on a miss
    pub cache_ttl: Duration,
    /// Retry and timeout settings for the loader
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_ttl: DEFAULT_TTL,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchOptions {
    /// Returns a copy with a different cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Returns a copy that bypasses the cache.
    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }

    /// Returns a copy with a different retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream catalog API
    pub catalog_api_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Default TTL for reference data
    pub default_ttl: Duration,
    /// TTL for search results
    pub search_ttl: Duration,
    /// Background sweep interval
    pub cleanup_interval: Duration,
    /// Default fetch options for upstream calls
    pub fetch: FetchOptions,
    /// Warm common resources at startup
    pub preload_on_start: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CATALOG_API_URL` - Upstream base URL (default: http://localhost:8080/api)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DEFAULT_TTL_MS` - Reference data TTL (default: 300000)
    /// - `SEARCH_TTL_MS` - Search result TTL (default: 60000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `ENABLE_CACHE` - Use the cache for upstream calls (default: true)
    /// - `RETRY_ATTEMPTS` - Attempts per upstream call (default: 3)
    /// - `RETRY_DELAY_MS` - Base backoff delay (default: 1000)
    /// - `REQUEST_TIMEOUT_MS` - Per-attempt timeout (default: 30000)
    /// - `PRELOAD_ON_START` - Warm common resources at startup (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_ttl = env_millis("DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl);

        Self {
            catalog_api_url: env::var("CATALOG_API_URL").unwrap_or(defaults.catalog_api_url),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            default_ttl,
            search_ttl: env_millis("SEARCH_TTL_MS").unwrap_or(defaults.search_ttl),
            cleanup_interval: env_parse("CLEANUP_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            fetch: FetchOptions {
                enable_cache: env_parse("ENABLE_CACHE").unwrap_or(true),
                cache_ttl: default_ttl,
                retry: RetryPolicy {
                    attempts: env_parse("RETRY_ATTEMPTS").unwrap_or(DEFAULT_RETRY_ATTEMPTS),
                    delay: env_millis("RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY),
                    timeout: env_millis("REQUEST_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT),
                },
            },
            preload_on_start: env_parse("PRELOAD_ON_START").unwrap_or(true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_api_url: "http://localhost:8080/api".to_string(),
            server_port: 3000,
            default_ttl: DEFAULT_TTL,
            search_ttl: SEARCH_TTL,
            cleanup_interval: CLEANUP_INTERVAL,
            fetch: FetchOptions::default(),
            preload_on_start: true,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse(name).map(Duration::from_millis)
}
