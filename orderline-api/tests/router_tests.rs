//! HTTP surface driven through the axum router without a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use orderline_api::{create_router, AppState, IngestMetrics};
use orderline_test_utils::fixtures::*;
use orderline_test_utils::{MemoryOrderStore, Order, OrderCache};
use serde_json::Value;
use tower::ServiceExt;

struct TestApp {
    store: Arc<MemoryOrderStore>,
    cache: Arc<OrderCache>,
    metrics: Arc<IngestMetrics>,
}

impl TestApp {
    fn new(stored: impl IntoIterator<Item = Order>) -> Self {
        Self {
            store: Arc::new(MemoryOrderStore::with_orders(stored)),
            cache: Arc::new(OrderCache::new()),
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    fn router(&self) -> Router {
        create_router(AppState::new(
            self.store.clone(),
            Arc::clone(&self.cache),
            Arc::clone(&self.metrics),
        ))
    }

    async fn get(&self, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = self
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body.to_vec())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

#[tokio::test]
async fn test_get_order_from_cache() {
    let app = TestApp::new([]);
    let order = sample_order();
    app.cache.set(order.clone());

    let (status, content_type, body) = app.get("/order/b563feb7b2b84b6test").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let decoded: Order = serde_json::from_slice(&body).unwrap();
    assert_eq!(decoded, order);
    assert_eq!(app.store.get_calls(), 0);
}

#[tokio::test]
async fn test_response_is_indented_json_with_rfc3339_date() {
    let app = TestApp::new([sample_order()]);

    let (_, _, body) = app.get("/api/order/b563feb7b2b84b6test").await;
    let text = String::from_utf8(body).unwrap();

    assert!(text.contains("\n  \"order_uid\": \"b563feb7b2b84b6test\""));
    assert!(text.contains("\"date_created\": \"2021-11-26T06:22:19Z\""));
}

#[tokio::test]
async fn test_api_prefix_falls_back_to_store_and_fills_cache() {
    let order = order_with_items("fallback1", 2);
    let app = TestApp::new([order.clone()]);

    let (status, json) = app.get_json("/api/order/fallback1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order_uid"], "fallback1");
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert_eq!(app.cache.get("fallback1"), Some(order));

    app.get("/order/fallback1").await;
    assert_eq!(app.store.get_calls(), 1);
}

#[tokio::test]
async fn test_unknown_order_is_404() {
    let app = TestApp::new([]);

    let (status, json) = app.get_json("/order/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
    assert!(app.cache.is_empty());
}

#[tokio::test]
async fn test_missing_id_is_400() {
    let app = TestApp::new([]);

    for uri in ["/order/", "/api/order/"] {
        let (status, json) = app.get_json(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(json["message"], "order id required");
    }
}

#[tokio::test]
async fn test_trailing_segments_use_first_segment_as_id() {
    let app = TestApp::new([order_with_uid("abc")]);

    for uri in ["/order/abc/extra", "/api/order/abc/extra/more"] {
        let (status, json) = app.get_json(uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(json["order_uid"], "abc");
    }
}

#[tokio::test]
async fn test_blank_id_is_404() {
    let app = TestApp::new([]);

    let (status, json) = app.get_json("/order/%20%20").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_missing_date_renders_as_zero_time() {
    let mut order = order_with_uid("nodate");
    order.date_created = None;
    let app = TestApp::new([order]);

    let (_, json) = app.get_json("/order/nodate").await;

    assert_eq!(json["date_created"], "0001-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_store_failure_is_500_without_details() {
    let app = TestApp::new([sample_order()]);
    app.store.set_unavailable(true);

    let (status, json) = app.get_json("/order/b563feb7b2b84b6test").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "DATABASE_ERROR");
    assert!(!json["message"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_index_page() {
    let app = TestApp::new([]);

    let (status, content_type, body) = app.get("/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(String::from_utf8(body).unwrap().contains("/api/order/"));
}

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new([]);
    let (status, json) = app.get_json("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_reports_cache_and_ingest() {
    let app = TestApp::new([]);
    app.cache.set(sample_order());
    app.metrics
        .persisted
        .fetch_add(3, std::sync::atomic::Ordering::Relaxed);

    let (status, json) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["details"]["database"]["status"], "healthy");
    assert_eq!(json["details"]["cache"]["entries"], 1);
    assert_eq!(json["details"]["ingest"]["persisted"], 3);
}

#[tokio::test]
async fn test_readiness_fails_when_store_down() {
    let app = TestApp::new([]);
    app.store.set_unavailable(true);

    let (status, json) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unhealthy");
    assert!(json["details"]["database"]["error"].is_string());
}
