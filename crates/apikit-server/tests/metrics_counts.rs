#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use axum::http::{Method, StatusCode};
use prometheus::core::Collector;
use prometheus::IntCounter;

use apikit_core::error::ApiKitError;
use apikit_server::services::work::JOBS_COMPLETED;
use apikit_server::services::{EchoService, HelloService, WorkService};

#[tokio::test]
async fn totals_match_request_count() {
    let mut server = common::server();
    server.register_service(HelloService::new()).unwrap();
    server.register_service(EchoService::new()).unwrap();
    let metrics = server.metrics();
    let app = server.prepare().unwrap();

    common::get(&app, "/api/v1/").await;
    common::get(&app, "/health").await;
    common::get(&app, "/does-not-exist").await;
    common::send(&app, Method::POST, "/api/v1/echo", Some(r#"{"message":"hi"}"#)).await;
    common::send(&app, Method::POST, "/api/v1/echo", Some("{not json")).await;

    assert_eq!(common::totals(&metrics), (5, 5));
}

#[tokio::test]
async fn concurrent_requests_are_all_counted() {
    let mut server = common::server();
    server.register_service(HelloService::new()).unwrap();
    let metrics = server.metrics();
    let app = server.prepare().unwrap();

    let mut handles = Vec::new();
    for _ in 0..64 {
        let app = app.clone();
        handles.push(tokio::spawn(async move { common::get(&app, "/api/v1/").await }));
    }
    for h in handles {
        let (status, _) = h.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(common::totals(&metrics), (64, 64));
    let ok = metrics
        .requests_total()
        .with_label_values(&["GET", "/api/v1/", "success"])
        .get();
    assert_eq!(ok, 64);
}

#[tokio::test]
async fn error_responses_use_error_label() {
    let mut server = common::server();
    server.register_service(EchoService::new()).unwrap();
    let metrics = server.metrics();
    let app = server.prepare().unwrap();

    let (status, body) = common::send(&app, Method::POST, "/api/v1/echo", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("BAD_REQUEST"));

    let (status, _) = common::get(&app, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let total = metrics.requests_total();
    assert_eq!(total.with_label_values(&["POST", "/api/v1/echo", "error"]).get(), 1);
    assert_eq!(total.with_label_values(&["POST", "/api/v1/echo", "success"]).get(), 0);
    assert_eq!(total.with_label_values(&["GET", "unmatched", "error"]).get(), 1);
    assert_eq!(total.with_label_values(&["GET", "unmatched", "success"]).get(), 0);
}

#[tokio::test]
async fn handler_error_does_not_disturb_other_requests() {
    let mut server = common::server();
    server.register_service(EchoService::new()).unwrap();
    let app = server.prepare().unwrap();

    let (bad, _) = common::send(&app, Method::POST, "/api/v1/echo", Some(r#"{"message":""}"#)).await;
    let (good, body) = common::send(&app, Method::POST, "/api/v1/echo", Some(r#"{"message":"still up"}"#)).await;
    assert_eq!(bad, StatusCode::BAD_REQUEST);
    assert_eq!(good, StatusCode::OK);
    assert!(body.contains("still up"));
}

#[tokio::test]
async fn custom_metrics_are_exposed() {
    let mut server = common::server();
    let work = WorkService::new().unwrap();
    server.metrics().register_custom(work.collectors()).unwrap();
    server.register_service(work).unwrap();
    let app = server.prepare().unwrap();

    let (status, body) = common::get(&app, "/api/v1/work?ms=1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Worked 1 ms"));

    let (_, exposition) = common::get(&app, "/metrics").await;
    assert!(exposition.contains(&format!("{JOBS_COMPLETED} 1")));
}

#[test]
fn duplicate_registration_is_fatal_before_serving() {
    let server = common::server();
    let metrics = server.metrics();

    let counter = IntCounter::new("my_custom_counter", "demo").unwrap();
    metrics
        .register_custom([Box::new(counter.clone()) as Box<dyn Collector>])
        .unwrap();

    let err = metrics
        .register_custom([Box::new(counter) as Box<dyn Collector>])
        .unwrap_err();
    assert!(matches!(err, ApiKitError::DuplicateMetric(ref name) if name == "my_custom_counter"));
    assert!(err.is_fatal());
}
