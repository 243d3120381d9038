//! Fake upstream catalog API for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use catalog_cache::{Cache, CatalogClient, FetchOptions, RetryPolicy};

/// Request counters and failure knobs shared with the fake upstream.
#[derive(Clone, Default)]
pub struct Upstream {
    pub requests: Arc<AtomicUsize>,
    /// Number of `/blogs` requests that fail with 500 before succeeding
    pub blog_failures: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

async fn categories(State(up): State<Upstream>) -> Json<Value> {
    up.hit();
    Json(json!([{"slug": "design"}, {"slug": "data"}]))
}

async fn cities(State(up): State<Upstream>) -> Json<Value> {
    up.hit();
    tokio::time::sleep(Duration::from_millis(30)).await;
    Json(json!([{"slug": "paris"}, {"slug": "lyon"}]))
}

async fn courses(
    State(up): State<Upstream>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    up.hit();
    Json(json!({"filters": query, "items": [{"slug": "rust-basics"}]}))
}

async fn course(State(up): State<Upstream>, Path(slug): Path<String>) -> (StatusCode, Json<Value>) {
    up.hit();
    if slug == "missing" {
        (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
    } else {
        (StatusCode::OK, Json(json!({"slug": slug})))
    }
}

async fn blogs(
    State(up): State<Upstream>,
    Query(query): Query<BTreeMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    up.hit();
    let remaining = up.blog_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        up.blog_failures.fetch_sub(1, Ordering::SeqCst);
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
    }
    (StatusCode::OK, Json(json!({"page": query.get("page"), "items": []})))
}

async fn search(State(up): State<Upstream>) -> Json<Value> {
    up.hit();
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!([]))
}

async fn sitemap(State(up): State<Upstream>) -> StatusCode {
    up.hit();
    StatusCode::SERVICE_UNAVAILABLE
}

/// Starts the fake upstream on an ephemeral port and returns its API base URL.
pub async fn spawn_upstream(upstream: Upstream) -> String {
    let router = Router::new()
        .route("/api/categories", get(categories))
        .route("/api/cities", get(cities))
        .route("/api/courses", get(courses))
        .route("/api/courses/:slug", get(course))
        .route("/api/blogs", get(blogs))
        .route("/api/search", get(search))
        .route("/api/sitemap", get(sitemap))
        .with_state(upstream);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}/api", addr)
}

/// Fetch options with short delays so retry tests stay fast.
pub fn fast_options() -> FetchOptions {
    FetchOptions::default().with_retry(RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(10),
        timeout: Duration::from_secs(2),
    })
}

/// A catalog client over a fresh cache pointed at a fresh fake upstream.
pub async fn test_client() -> (CatalogClient, Upstream) {
    let upstream = Upstream::default();
    let base_url = spawn_upstream(upstream.clone()).await;
    let cache = Cache::new(Duration::from_secs(300));
    let client = CatalogClient::new(base_url, cache).with_options(fast_options());
    (client, upstream)
}
