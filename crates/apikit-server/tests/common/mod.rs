#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use apikit_server::{MetricsCollector, Server};

pub fn server() -> Server {
    Server::new(8080, Arc::new(MetricsCollector::new().unwrap()))
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(b) => {
            builder = builder
                .header("content-type", "application/json")
                .header("content-length", b.len());
            Body::from(b.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    send(app, Method::GET, uri, None).await
}

/// Sum of `http_requests_total` and `http_request_duration_seconds` sample counts
/// across every label combination.
pub fn totals(metrics: &MetricsCollector) -> (u64, u64) {
    let mut requests = 0;
    let mut observations = 0;
    for family in metrics.registry().gather() {
        match family.get_name() {
            "http_requests_total" => {
                for m in family.get_metric() {
                    requests += m.get_counter().get_value() as u64;
                }
            }
            "http_request_duration_seconds" => {
                for m in family.get_metric() {
                    observations += m.get_histogram().get_sample_count();
                }
            }
            _ => {}
        }
    }
    (requests, observations)
}
