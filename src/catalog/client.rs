//! Catalog Client
//!
//! Reads catalog resources from the upstream REST API through the cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{build_key, Cache};
use crate::catalog::Endpoint;
use crate::config::{Config, FetchOptions, SEARCH_TTL};
use crate::error::{FetchError, Result};

/// Request filters, by parameter name.
pub type Filters = BTreeMap<String, String>;

// == Catalog Client ==
/// Cached client for the upstream catalog API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    cache: Cache,
    options: FetchOptions,
    search_ttl: Duration,
}

impl CatalogClient {
    // == Constructors ==
    /// Creates a client for `base_url` with default fetch options.
    pub fn new(base_url: impl Into<String>, cache: Cache) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache,
            options: FetchOptions::default(),
            search_ttl: SEARCH_TTL,
        }
    }

    /// Creates a client from service configuration.
    pub fn from_config(config: &Config, cache: Cache) -> Self {
        Self::new(config.catalog_api_url.clone(), cache)
            .with_options(config.fetch)
            .with_search_ttl(config.search_ttl)
    }

    /// Replaces the default fetch options.
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the TTL used for volatile endpoints.
    pub fn with_search_ttl(mut self, ttl: Duration) -> Self {
        self.search_ttl = ttl;
        self
    }

    /// The cache this client reads through.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Fetch options applied to `endpoint`.
    pub fn options_for(&self, endpoint: Endpoint) -> FetchOptions {
        if endpoint.is_volatile() {
            self.options.with_ttl(self.search_ttl)
        } else {
            self.options
        }
    }

    // == Fetch ==
    /// Fetches `endpoint` (and `slug` for item endpoints) with `filters`.
    ///
    /// Requests with the same non-empty filters share one cache entry.
    pub async fn fetch(
        &self,
        endpoint: Endpoint,
        slug: Option<&str>,
        filters: &Filters,
    ) -> Result<Arc<Value>> {
        let request = self.request(endpoint, slug, filters)?;
        self.cache
            .fetch_with(&request.key, &request.options, request.call.into_op())
            .await
    }

    /// Warms one resource. Failures are logged by the cache and dropped.
    pub async fn preload(&self, endpoint: Endpoint, slug: Option<&str>, filters: &Filters) {
        let request = match self.request(endpoint, slug, filters) {
            Ok(request) => request,
            Err(err) => {
                debug!("Skipping preload of {}: {}", endpoint, err);
                return;
            }
        };
        if !request.options.enable_cache {
            return;
        }

        let policy = request.options.retry;
        let op = request.call.into_op();
        self.cache
            .preload(&request.key, request.options.cache_ttl, move || async move {
                policy.run(op).await
            })
            .await;
    }

    /// Warms the resources nearly every page needs: categories, cities,
    /// upcoming courses and the first page of blogs.
    pub async fn preload_common(&self) {
        let empty = Filters::new();
        let upcoming = filters([("upcoming", "true")]);
        let first_page = filters([("page", "1")]);

        join_all([
            self.preload(Endpoint::Categories, None, &empty),
            self.preload(Endpoint::Cities, None, &empty),
            self.preload(Endpoint::Courses, None, &upcoming),
            self.preload(Endpoint::Blogs, None, &first_page),
        ])
        .await;

        info!("Preload finished, {} entries cached", self.cache.stats().size);
    }

    // == Resource Helpers ==
    pub async fn categories(&self) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Categories, None, &Filters::new()).await
    }

    pub async fn category(&self, slug: &str) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Category, Some(slug), &Filters::new()).await
    }

    pub async fn cities(&self) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Cities, None, &Filters::new()).await
    }

    pub async fn city(&self, slug: &str) -> Result<Arc<Value>> {
        self.fetch(Endpoint::City, Some(slug), &Filters::new()).await
    }

    pub async fn courses(&self, filters: &Filters) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Courses, None, filters).await
    }

    pub async fn course(&self, slug: &str) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Course, Some(slug), &Filters::new()).await
    }

    /// Full-text search; cached with the short search TTL.
    pub async fn search(&self, query: &str, filters: &Filters) -> Result<Arc<Value>> {
        let mut filters = filters.clone();
        filters.insert("q".to_string(), query.to_string());
        self.fetch(Endpoint::Search, None, &filters).await
    }

    pub async fn blogs(&self, page: u32) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Blogs, None, &filters([("page", page.to_string())]))
            .await
    }

    pub async fn blog(&self, slug: &str) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Blog, Some(slug), &Filters::new()).await
    }

    pub async fn sitemap(&self) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Sitemap, None, &Filters::new()).await
    }

    /// SEO metadata for a site page.
    pub async fn seo(&self, page: &str) -> Result<Arc<Value>> {
        self.fetch(Endpoint::Seo, None, &filters([("page", page)])).await
    }

    /// Resolves the cache key, options and upstream call for a request.
    fn request(&self, endpoint: Endpoint, slug: Option<&str>, filters: &Filters) -> Result<Request> {
        let url = format!("{}{}", self.base_url, endpoint.path(slug)?);

        // The path slug wins over a `slug` filter, in the key and upstream
        let filters: Vec<(&String, &String)> = filters
            .iter()
            .filter(|(name, _)| slug.is_none() || name.as_str() != "slug")
            .collect();

        let mut key_filters: Vec<(&str, Option<&str>)> = filters
            .iter()
            .map(|&(name, value)| (name.as_str(), Some(value.as_str())))
            .collect();
        if let Some(slug) = slug {
            key_filters.push(("slug", Some(slug)));
        }

        let query = filters
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Request {
            key: build_key(endpoint.namespace(), key_filters),
            options: self.options_for(endpoint),
            call: UpstreamCall {
                http: self.http.clone(),
                url,
                query,
            },
        })
    }
}

/// Builds a filter map from name/value pairs.
pub fn filters<I, K, V>(pairs: I) -> Filters
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}

struct Request {
    key: String,
    options: FetchOptions,
    call: UpstreamCall,
}

/// One GET against the upstream API, repeatable across retry attempts.
struct UpstreamCall {
    http: reqwest::Client,
    url: String,
    query: Vec<(String, String)>,
}

impl UpstreamCall {
    fn into_op(self) -> impl FnMut() -> BoxFuture<'static, Result<Value>> + Send + 'static {
        let call = Arc::new(self);
        move || {
            let call = call.clone();
            async move { call.get_json().await }.boxed()
        }
    }

    async fn get_json(&self) -> Result<Value> {
        debug!("GET {} {:?}", self.url, self.query);

        let response = self.http.get(&self.url).query(&self.query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
