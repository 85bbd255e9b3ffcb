//! End-to-end lookup tests
//!
//! Drives the real router with the in-memory cache and the HTTP provider
//! client pointed at a mock food API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use httpmock::prelude::*;
use serde_json::json;
use tower::ServiceExt; // for `oneshot`

use calorie_lookup::cache::{CacheStore, MemoryCacheStore};
use calorie_lookup::data::{FoodFactsClient, RetryPolicy};
use calorie_lookup::lookup::{FoodResponse, LookupService};
use calorie_lookup::server::{router, LOOKUP_PATH};

/// Router plus a handle on the cache it writes to
fn test_app(server: &MockServer, retry_policy: RetryPolicy) -> (Router, MemoryCacheStore) {
    let cache = MemoryCacheStore::new();
    let provider = FoodFactsClient::new(server.base_url())
        .expect("client should build")
        .with_retry_policy(retry_policy);
    let lookup = LookupService::new(Arc::new(cache.clone()), Arc::new(provider));
    (router(lookup), cache)
}

fn lookup_request(barcode: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(LOOKUP_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "barcode": barcode }).to_string()))
        .expect("request should build")
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("request should complete")
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

#[tokio::test]
async fn test_found_product_is_returned_and_cached() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/product/0000000000017.json");
        then.status(200).json_body(json!({
            "status": 1,
            "product": {"nutriments": {"energy-kcal_100g": 250.7}}
        }));
    });
    let (app, cache) = test_app(&server, RetryPolicy::default());

    let response = send(&app, lookup_request("0000000000017")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let expected = r#"{"barcode":"0000000000017","calories":250,"source":"external_api"}"#;
    assert_eq!(body_string(response).await, expected);

    let cached = cache
        .get("food:barcode:0000000000017")
        .await
        .expect("cache read")
        .expect("entry should be cached");
    assert_eq!(cached, expected.as_bytes());
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_repeat_lookup_is_served_from_cache() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/product/5449000000996.json");
        then.status(200).json_body(json!({
            "status": 1,
            "product": {"nutriments": {"energy-kcal_100g": 42.9}}
        }));
    });
    let (app, _cache) = test_app(&server, RetryPolicy::default());

    let first = body_string(send(&app, lookup_request("5449000000996")).await).await;
    let second_response = send(&app, lookup_request("5449000000996")).await;
    assert_eq!(second_response.status(), StatusCode::OK);
    let second = body_string(second_response).await;

    assert_eq!(first, second);
    let decoded: FoodResponse = serde_json::from_str(&second).expect("valid JSON");
    assert_eq!(decoded.calories, 42);
    assert_eq!(mock.calls(), 1, "Second lookup must not reach the provider");
}

#[tokio::test]
async fn test_unknown_product_is_404_and_not_cached() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/product/9999999999999.json");
        then.status(200).json_body(json!({"status": 0}));
    });
    let (app, cache) = test_app(&server, RetryPolicy::default());

    let response = send(&app, lookup_request("9999999999999")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "food not found");
    assert_eq!(cache.entry_count().await, 0, "NotFound must not be cached");
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_upstream_failure_is_502_after_retries() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/product/123.json");
        then.status(500);
    });
    let (app, cache) = test_app(&server, RetryPolicy::default());

    let started = Instant::now();
    let response = send(&app, lookup_request("123")).await;
    let elapsed = started.elapsed();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_string(response).await, "external api error");
    assert_eq!(mock.calls(), 3);
    assert!(elapsed >= Duration::from_millis(600), "elapsed {:?}", elapsed);
    assert_eq!(cache.entry_count().await, 0, "Failures must not be cached");
}

#[tokio::test]
async fn test_invalid_body_is_400_without_upstream_call() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET);
        then.status(200);
    });
    let (app, _cache) = test_app(&server, RetryPolicy::default());

    let request = Request::builder()
        .method("POST")
        .uri(LOOKUP_PATH)
        .body(Body::from("barcode=123"))
        .expect("request should build");
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "invalid request body");
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_lookups_for_different_barcodes() {
    let server = MockServer::start();
    let barcodes = ["111", "222", "333", "444"];
    let mocks: Vec<_> = barcodes
        .iter()
        .enumerate()
        .map(|(i, barcode)| {
            let path = format!("/product/{}.json", barcode);
            server.mock(move |when, then| {
                when.method(GET).path(path);
                then.status(200).json_body(json!({
                    "status": 1,
                    "product": {"nutriments": {"energy-kcal_100g": (i as f64) * 100.5}}
                }));
            })
        })
        .collect();
    let (app, cache) = test_app(&server, RetryPolicy::default());

    let responses = futures::future::join_all(
        barcodes.iter().map(|barcode| send(&app, lookup_request(barcode))),
    )
    .await;

    for (i, response) in responses.into_iter().enumerate() {
        assert_eq!(response.status(), StatusCode::OK);
        let decoded: FoodResponse =
            serde_json::from_str(&body_string(response).await).expect("valid JSON");
        assert_eq!(decoded.barcode, barcodes[i]);
        assert_eq!(decoded.calories, ((i as f64) * 100.5) as i64);
    }
    for mock in &mocks {
        assert_eq!(mock.calls(), 1);
    }
    assert_eq!(cache.entry_count().await, barcodes.len() as u64);
}
