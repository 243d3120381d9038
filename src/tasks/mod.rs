//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the cache.
//!
//! # Tasks
//! - Expiry sweep: Removes expired cache entries at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
