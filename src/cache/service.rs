//! Cache Service Module
//!
//! The shared cache handle injected into every data-access call. It owns one
//! store for all payload types, serves fetch-through loads with single-flight
//! de-duplication, and exposes invalidation and preloading.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore, Clock, Invalidation, SystemClock};
use crate::config::{Config, FetchOptions};
use crate::error::{FetchError, Result};

/// Type-erased cached payload.
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

type SharedLoad = Shared<BoxFuture<'static, Result<ErasedValue>>>;

/// A load in progress for one key.
struct InFlight {
    id: u64,
    load: SharedLoad,
}

struct Inner {
    store: Mutex<CacheStore<ErasedValue>>,
    // Lock order: in_flight before store
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_load_id: AtomicU64,
}

impl Inner {
    /// Finishes load `id`: stores a success, unless the load was detached
    /// by an invalidation while it ran.
    fn complete(&self, key: &str, id: u64, ttl: Duration, result: &Result<ErasedValue>) {
        let mut in_flight = self.in_flight.lock();
        let attached = matches!(in_flight.get(key), Some(current) if current.id == id);
        if !attached {
            debug!("Load for '{}' was invalidated while running, not storing", key);
            return;
        }
        in_flight.remove(key);

        if let Ok(value) = result {
            self.store.lock().set(key.to_string(), value.clone(), Some(ttl));
        }
    }
}

// == Cache ==
/// Cloneable handle to a TTL cache.
///
/// Create one at startup and pass clones to every collaborator; all clones
/// share the same entries and statistics.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    // == Constructors ==
    /// Creates a cache with the given default TTL on the system clock.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(CacheStore::with_clock(default_ttl, clock)),
                in_flight: Mutex::new(HashMap::new()),
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a cache from service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_ttl)
    }

    // == Store Access ==
    /// Returns the cached value for `key` if present, unexpired and of type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.inner.store.lock().get_if(key, |value| value.is::<T>())?;
        value.downcast::<T>().ok()
    }

    /// Stores `value` under `key`. Without a TTL the cache default applies.
    pub fn set<T: Send + Sync + 'static>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Duration>,
    ) {
        self.inner.store.lock().set(key.into(), Arc::new(value), ttl);
    }

    /// Removes one entry. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.invalidate(Invalidation::Keys(vec![key.to_string()])) > 0
    }

    /// Removes every entry and resets the hit/miss counters.
    pub fn clear(&self) {
        self.invalidate(Invalidation::All);
    }

    /// Removes every entry whose key matches `pattern`.
    pub fn delete_by_pattern(&self, pattern: &Regex) -> usize {
        self.invalidate(Invalidation::Pattern(pattern.clone()))
    }

    /// Removes every entry built for one of `endpoints`.
    pub fn delete_by_endpoints<S: AsRef<str>>(&self, endpoints: &[S]) -> usize {
        self.invalidate(Invalidation::endpoints(endpoints.iter().map(|ep| ep.as_ref())))
    }

    // == Invalidate ==
    /// Drops the targeted entries and detaches matching in-flight loads, so a
    /// load started before the invalidation cannot repopulate its key.
    ///
    /// Returns the number of stored entries removed.
    pub fn invalidate(&self, invalidation: Invalidation) -> usize {
        let mut in_flight = self.inner.in_flight.lock();
        in_flight.retain(|key, _| !invalidation.matches(key));

        let mut store = self.inner.store.lock();
        let removed = match &invalidation {
            Invalidation::Keys(keys) => keys.iter().filter(|key| store.delete(key)).count(),
            Invalidation::Pattern(pattern) => store.delete_by_pattern(pattern),
            Invalidation::Endpoints(endpoints) => store.delete_by_endpoints(endpoints.as_slice()),
            Invalidation::All => {
                let count = store.len();
                store.clear();
                count
            }
        };

        debug!("Invalidated {} entries ({:?})", removed, invalidation);
        removed
    }

    /// Returns current statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.store.lock().stats()
    }

    /// Returns the stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.inner.store.lock().keys()
    }

    /// Removes expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.inner.store.lock().cleanup_expired()
    }

    /// Number of loads currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    // == Fetch Through ==
    /// Returns the cached value for `key`, or runs `loader`, caches its
    /// result for `ttl` and returns it.
    ///
    /// Concurrent calls that miss on the same key share a single run of the
    /// loader. A failed load stores nothing and its error reaches every
    /// waiter. The load runs on its own task, so it still completes and
    /// populates the cache if the caller stops waiting.
    pub async fn fetch_through<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.get::<T>(key) {
            debug!("Cache hit for '{}'", key);
            return Ok(value);
        }

        let load = self.join_or_start::<T, F, Fut>(key, ttl, loader);
        let value = load.await?;
        value
            .downcast::<T>()
            .map_err(|_| FetchError::TypeMismatch(key.to_string()))
    }

    /// Fetch-through with the loader wrapped in `options.retry`.
    ///
    /// `op` is invoked once per attempt. With caching disabled the store is
    /// neither read nor written.
    pub async fn fetch_with<T, F, Fut>(
        &self,
        key: &str,
        options: &FetchOptions,
        op: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let policy = options.retry;

        if !options.enable_cache {
            return policy.run(op).await.map(Arc::new);
        }

        self.fetch_through(key, options.cache_ttl, move || async move { policy.run(op).await })
            .await
    }

    // == Preload ==
    /// Warms `key` ahead of demand. Failures are logged and swallowed.
    pub async fn preload<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.fetch_through::<T, F, Fut>(key, ttl, loader).await {
            Ok(_) => debug!("Preloaded '{}'", key),
            Err(err) => warn!("Preload of '{}' failed: {}", key, err),
        }
    }

    /// Joins the running load for `key` or starts a new one.
    fn join_or_start<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> SharedLoad
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(running) = in_flight.get(key) {
            debug!("Joining in-flight load for '{}'", key);
            return running.load.clone();
        }

        // Another load may have finished between the miss and taking the lock
        if let Some(value) = self.inner.store.lock().peek(key) {
            if value.is::<T>() {
                return futures::future::ready(Ok(value)).boxed().shared();
            }
        }

        debug!("Cache miss for '{}', loading", key);
        let id = self.inner.next_load_id.fetch_add(1, Ordering::Relaxed);
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let owned_key = key.to_string();

        let task = tokio::spawn(async move {
            // A panicking loader must still release its in-flight slot
            let result = match AssertUnwindSafe(async move { loader().await })
                .catch_unwind()
                .await
            {
                Ok(result) => result.map(|value| Arc::new(value) as ErasedValue),
                Err(panic) => Err(FetchError::Loader(format!(
                    "loader panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            if let Some(inner) = inner.upgrade() {
                inner.complete(&owned_key, id, ttl, &result);
            }
            result
        });

        let load = async move {
            task.await
                .unwrap_or_else(|err| Err(FetchError::Loader(format!("load task failed: {}", err))))
        }
        .boxed()
        .shared();

        in_flight.insert(
            key.to_string(),
            InFlight {
                id,
                load: load.clone(),
            },
        );
        load
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("stats", &self.stats())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::retry::RetryPolicy;
    use std::sync::atomic::AtomicU32;

    const TTL: Duration = Duration::from_secs(300);

    fn counting_loader(
        calls: &Arc<AtomicU32>,
        value: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String>> + Send + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value.to_string()) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_fetch_through_caches_result() {
        let cache = Cache::new(TTL);
        let calls = Arc::new(AtomicU32::new(0));

        let first = cache
            .fetch_through("cities", TTL, counting_loader(&calls, "paris"))
            .await
            .unwrap();
        let second = cache
            .fetch_through("cities", TTL, counting_loader(&calls, "lyon"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, "paris");
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = Cache::new(TTL);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = cache
            .fetch_through::<String, _, _>("courses", TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Loader("upstream down".to_string()))
            })
            .await;
        assert_eq!(result, Err(FetchError::Loader("upstream down".to_string())));
        assert!(cache.get::<String>("courses").is_none());

        let value = cache
            .fetch_through("courses", TTL, counting_loader(&calls, "ok"))
            .await
            .unwrap();
        assert_eq!(*value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    async fn exploding_loader() -> Result<String> {
        panic!("upstream client bug")
    }

    #[tokio::test]
    async fn test_panicking_load_is_not_cached() {
        let cache = Cache::new(TTL);
        let calls = Arc::new(AtomicU32::new(0));

        let err = cache
            .fetch_through("cities", TTL, exploding_loader)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::Loader("loader panicked: upstream client bug".to_string())
        );
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.keys().is_empty());

        let value = cache
            .fetch_through("cities", TTL, counting_loader(&calls, "paris"))
            .await
            .unwrap();
        assert_eq!(*value, "paris");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let cache = Cache::new(TTL);
        let calls = Arc::new(AtomicU32::new(0));

        let loads = (0..8).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .fetch_through("categories", TTL, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(vec!["design", "data"])
                    })
                    .await
            }
        });
        let results = futures::future::join_all(loads).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(*result.unwrap(), vec!["design", "data"]);
        }
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_invalidation_detaches_running_load() {
        let cache = Cache::new(TTL);

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .fetch_through("blogs_{}", TTL, || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("stale page".to_string())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.in_flight(), 1);
        cache.delete_by_endpoints(&["blogs"]);

        let value = waiter.await.unwrap().unwrap();
        assert_eq!(*value, "stale page");
        assert!(cache.get::<String>("blogs_{}").is_none());
    }

    #[tokio::test]
    async fn test_load_completes_after_caller_gives_up() {
        let cache = Cache::new(TTL);

        let attempt = tokio::time::timeout(
            Duration::from_millis(10),
            cache.fetch_through("sitemap", TTL, || async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok(42u32)
            }),
        )
        .await;
        assert!(attempt.is_err());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get::<u32>("sitemap").as_deref(), Some(&42));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = Cache::new(TTL);
        cache.set("seo_{}", 5u64, None);

        assert!(cache.get::<String>("seo_{}").is_none());
        assert_eq!(cache.get::<u64>("seo_{}").as_deref(), Some(&5));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_fetch_through_respects_ttl() {
        let clock = ManualClock::new(0);
        let cache = Cache::with_clock(TTL, Arc::new(clock.clone()));
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .fetch_through("search_{}", Duration::from_millis(1_000), counting_loader(&calls, "a"))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(1_000));
        cache
            .fetch_through("search_{}", Duration::from_millis(1_000), counting_loader(&calls, "b"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(1));
        let value = cache
            .fetch_through("search_{}", Duration::from_millis(1_000), counting_loader(&calls, "c"))
            .await
            .unwrap();
        assert_eq!(*value, "c");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_with_retries_then_caches() {
        let cache = Cache::new(TTL);
        let calls = Arc::new(AtomicU32::new(0));
        let options = FetchOptions::default().with_retry(RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(5),
            timeout: Duration::from_secs(1),
        });

        let counter = calls.clone();
        let value = cache
            .fetch_with("cities", &options, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(FetchError::Loader("flaky".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(*value, 3);
        assert_eq!(cache.get::<u32>("cities").as_deref(), Some(&3));
    }

    #[tokio::test]
    async fn test_fetch_with_cache_disabled_bypasses_store() {
        let cache = Cache::new(TTL);
        let options = FetchOptions::default().without_cache();

        let value = cache
            .fetch_with("cities", &options, || async { Ok("fresh".to_string()) })
            .await
            .unwrap();

        assert_eq!(*value, "fresh");
        assert!(cache.keys().is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_preload_swallows_failures() {
        let cache = Cache::new(TTL);

        cache
            .preload::<String, _, _>("cities", TTL, || async {
                Err(FetchError::Loader("offline".to_string()))
            })
            .await;
        assert!(cache.keys().is_empty());

        cache
            .preload("categories", TTL, || async { Ok(vec![1, 2, 3]) })
            .await;
        assert_eq!(cache.keys(), vec!["categories".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_resets_stats() {
        let cache = Cache::new(TTL);
        cache.set("a", 1u8, None);
        cache.get::<u8>("a");
        cache.get::<u8>("b");

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 0.0);
        assert!(cache.get::<u8>("a").is_none());
    }

    #[tokio::test]
    async fn test_delete_by_pattern() {
        let cache = Cache::new(TTL);
        cache.set("course_A", 1u8, None);
        cache.set("course_B", 2u8, None);
        cache.set("city_X", 3u8, None);

        let removed = cache.delete_by_pattern(&Regex::new("^course_").unwrap());

        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["city_X".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_single_key() {
        let cache = Cache::new(TTL);
        cache.set("course_A", 1u8, None);

        assert!(cache.delete("course_A"));
        assert!(!cache.delete("course_A"));
    }
}
