//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

// == Cache Entry ==
/// Represents a single cache entry with its payload and timing metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored payload
    pub value: V,
    /// Creation timestamp (milliseconds, as read from the store clock)
    pub created_at: u64,
    /// Milliseconds the entry stays valid after `created_at`
    pub ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry stamped at `now_ms`.
    pub fn new(value: V, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            value,
            created_at: now_ms,
            ttl_ms,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is valid while `now - created_at <= ttl`, so it is still
    /// served at exactly the TTL boundary and expires one millisecond later.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        let expires = self.created_at.saturating_add(self.ttl_ms);
        expires.saturating_sub(now_ms)
    }
}
