//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle, with catalog reads going through
//! the cache to a fake upstream.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use catalog_cache::{api::create_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

use common::{test_client, Upstream};

// == Helper Functions ==

async fn create_test_app() -> (Router, Upstream) {
    let (client, upstream) = test_client().await;
    (create_router(AppState::new(client)), upstream)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == Catalog Endpoint Tests ==

#[tokio::test]
async fn test_catalog_read_is_cached() {
    let (app, upstream) = create_test_app().await;

    let (status, first) = send(&app, "GET", "/catalog/cities", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = send(&app, "GET", "/catalog/cities", None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first, second);
    assert_eq!(upstream.requests(), 1);

    let (_, stats) = send(&app, "GET", "/cache/stats", None).await;
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["hit_rate"], 50.0);
    assert_eq!(stats["size"], 1);
}

#[tokio::test]
async fn test_catalog_query_order_does_not_matter() {
    let (app, upstream) = create_test_app().await;

    send(&app, "GET", "/catalog/courses?city=paris&category=data", None).await;
    send(&app, "GET", "/catalog/courses?category=data&city=paris&level=", None).await;

    assert_eq!(upstream.requests(), 1);

    let (_, keys) = send(&app, "GET", "/cache/keys", None).await;
    assert_eq!(keys["count"], 1);
    assert_eq!(keys["keys"][0], r#"courses_{"category":"data","city":"paris"}"#);
}

#[tokio::test]
async fn test_catalog_item_endpoint() {
    let (app, _) = create_test_app().await;

    let (status, json) = send(&app, "GET", "/catalog/course/rust-basics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["slug"], "rust-basics");
}

#[tokio::test]
async fn test_catalog_upstream_not_found() {
    let (app, _) = create_test_app().await;

    let (status, json) = send(&app, "GET", "/catalog/course/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_catalog_upstream_failure_is_bad_gateway() {
    let (app, _) = create_test_app().await;

    let (status, _) = send(&app, "GET", "/catalog/sitemap", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_catalog_missing_slug_is_bad_request() {
    let (app, upstream) = create_test_app().await;

    let (status, _) = send(&app, "GET", "/catalog/course", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(upstream.requests(), 0);
}

// == Invalidation Endpoint Tests ==

#[tokio::test]
async fn test_invalidate_by_endpoint_forces_reload() {
    let (app, upstream) = create_test_app().await;

    send(&app, "GET", "/catalog/cities", None).await;
    send(&app, "GET", "/catalog/categories", None).await;

    let (status, json) = send(
        &app,
        "POST",
        "/cache/invalidate",
        Some(r#"{"endpoints":["cities"]}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    send(&app, "GET", "/catalog/cities", None).await;
    send(&app, "GET", "/catalog/categories", None).await;
    assert_eq!(upstream.requests(), 3);
}

#[tokio::test]
async fn test_invalidate_by_pattern() {
    let (app, _) = create_test_app().await;

    send(&app, "GET", "/catalog/course/rust-basics", None).await;
    send(&app, "GET", "/catalog/course/go-basics", None).await;
    send(&app, "GET", "/catalog/cities", None).await;

    let (status, json) = send(
        &app,
        "POST",
        "/cache/invalidate",
        Some(r#"{"pattern":"^course_"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (_, keys) = send(&app, "GET", "/cache/keys", None).await;
    assert_eq!(keys["keys"], serde_json::json!(["cities_{}"]));
}

#[tokio::test]
async fn test_invalidate_bad_pattern() {
    let (app, _) = create_test_app().await;

    let (status, json) = send(
        &app,
        "POST",
        "/cache/invalidate",
        Some(r#"{"pattern":"(unclosed"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid pattern"));
}

#[tokio::test]
async fn test_delete_key_endpoint() {
    let (app, _) = create_test_app().await;

    send(&app, "GET", "/catalog/categories", None).await;

    let (status, json) = send(&app, "DELETE", "/cache/keys/categories_%7B%7D", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "categories_{}");

    let (status, _) = send(&app, "DELETE", "/cache/keys/categories_%7B%7D", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_resets_stats() {
    let (app, _) = create_test_app().await;

    send(&app, "GET", "/catalog/categories", None).await;
    send(&app, "GET", "/catalog/categories", None).await;

    let (status, json) = send(&app, "DELETE", "/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    let (_, stats) = send(&app, "GET", "/cache/stats", None).await;
    assert_eq!(stats["size"], 0);
    assert_eq!(stats["hits"], 0);
    assert_eq!(stats["misses"], 0);
    assert_eq!(stats["hit_rate"], 0.0);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app().await;

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}
