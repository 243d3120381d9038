//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries,
//! independent of reads and writes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that periodically removes expired entries.
///
/// The sweep only drops entries whose TTL has elapsed; live entries and the
/// hit/miss counters are left alone.
///
/// # Returns
/// A JoinHandle for the spawned task, which should be aborted on shutdown.
///
/// # Example
/// ```ignore
/// let cache = Cache::new(Duration::from_secs(300));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Cache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweep with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired();

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
