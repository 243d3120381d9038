//! Cache Module
//!
//! Provides an in-memory TTL cache with fetch-through loading, single-flight
//! de-duplication, pattern and endpoint invalidation, and preloading.

mod clock;
mod entry;
mod invalidation;
mod key;
mod service;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use invalidation::Invalidation;
pub use key::{build_key, namespace_key};
pub use service::{Cache, ErasedValue};
pub use stats::CacheStats;
pub use store::CacheStore;
