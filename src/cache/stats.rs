//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and expirations.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the cache
    pub size: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Percentage of lookups that were hits, or 0.0 with no lookups yet.
    pub fn hit_rate(&self) -> f64 {
        self.percent_of_lookups(self.hits)
    }

    // == Miss Rate ==
    /// Percentage of lookups that were misses, or 0.0 with no lookups yet.
    pub fn miss_rate(&self) -> f64 {
        self.percent_of_lookups(self.misses)
    }

    fn percent_of_lookups(&self, count: u64) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
