//! Retry and Timeout Module
//!
//! Bounded retry with linear backoff and a per-attempt timeout race. These
//! helpers keep no state between calls and know nothing about the cache;
//! they wrap the loader handed to `Cache::fetch_through`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{FetchError, Result};

/// Default number of attempts per call
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

// == Retry Policy ==
/// Retry and timeout settings for one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of invocations, at least one is always made
    pub attempts: u32,
    /// Base delay; the wait after attempt `n` is `delay * n`
    pub delay: Duration,
    /// Time limit for each individual attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` with a fresh timeout window per attempt, retrying failures.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        with_retry(|| with_timeout(op(), timeout), self.attempts, self.delay).await
    }
}

// == With Retry ==
/// Calls `op` up to `attempts` times, waiting `delay * attempt` between tries.
///
/// Returns the first success, or the last error once attempts run out.
pub async fn with_retry<T, F, Fut>(mut op: F, attempts: u32, delay: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                let wait = delay * attempt;
                warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, attempts, err, wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// == With Timeout ==
/// Races `fut` against a timer.
///
/// When the timer wins the future is dropped and `FetchError::Timeout` is
/// returned. Dropping cancels the attempt; a shared cache load survives it
/// because `Cache::fetch_through` runs the load on its own task.
pub async fn with_timeout<T, Fut>(fut: Fut, timeout: Duration) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}
