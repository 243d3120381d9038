//! Cache Store Module
//!
//! Keyed TTL storage with hit/miss accounting and bulk invalidation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock};

// == Cache Store ==
/// TTL cache storage over an arbitrary payload type.
///
/// The store is a plain data structure; callers that share it wrap it in a
/// lock. None of its operations fail.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// TTL applied when `set` is called without one
    default_ttl: Duration,
    /// Time source for stamping and expiry checks
    clock: Arc<dyn Clock>,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore using the system clock.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    /// Creates a new CacheStore reading time from `clock`.
    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            default_ttl,
            clock,
        }
    }

    // == Set ==
    /// Stores a value, overwriting any previous entry and restarting its TTL.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (uses the store default if None)
    pub fn set(&mut self, key: String, value: V, ttl: Option<Duration>) {
        let ttl_ms = ttl.unwrap_or(self.default_ttl).as_millis() as u64;
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl_ms);
        self.entries.insert(key, entry);
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns the value if found and not expired. Expired entries are
    /// removed on read and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_if(key, |_| true)
    }

    /// Like `get`, but a live value rejected by `accept` is reported as a
    /// miss and left in place.
    pub fn get_if(&mut self, key: &str, accept: impl FnOnce(&V) -> bool) -> Option<V> {
        let now = self.clock.now_ms();

        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) && accept(&entry.value) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.record_miss();
                None
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Peek ==
    /// Returns a valid entry's value without touching statistics.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry and resets the hit/miss counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.reset();
    }

    // == Delete By Pattern ==
    /// Removes all entries whose key matches `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn delete_by_pattern(&mut self, pattern: &Regex) -> usize {
        self.remove_where(|key| pattern.is_match(key))
    }

    // == Delete By Endpoints ==
    /// Removes all entries belonging to any of the given endpoints.
    ///
    /// A key belongs to an endpoint when it equals the endpoint name or
    /// starts with `"{endpoint}_"`, the prefix produced by `build_key`.
    pub fn delete_by_endpoints<S: AsRef<str>>(&mut self, endpoints: &[S]) -> usize {
        self.remove_where(|key| endpoints.iter().any(|ep| key_in_endpoint(key, ep.as_ref())))
    }

    // == Stats ==
    /// Returns current cache statistics.
    ///
    /// `size` counts stored entries, including expired ones the sweep has
    /// not reached yet.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all entries that are expired right now.
    ///
    /// Returns the number of entries removed. Hit/miss counters are untouched.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    // == Keys ==
    /// Returns the currently stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_where(&mut self, mut matches: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !matches(key));
        before - self.entries.len()
    }
}

/// Whether `key` was built for `endpoint`.
pub(crate) fn key_in_endpoint(key: &str, endpoint: &str) -> bool {
    match key.strip_prefix(endpoint) {
        Some(rest) => rest.is_empty() || rest.starts_with('_'),
        None => false,
    }
}
