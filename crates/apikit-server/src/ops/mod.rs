//! Fixed operational HTTP endpoints.
//!
//! - `/health`  : liveness, always `200 OK`
//! - `/metrics` : Prometheus text format

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::obs::metrics::{MetricsCollector, EXPOSITION_CONTENT_TYPE};
use crate::service::Routes;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn metrics(metrics: Arc<MetricsCollector>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics exposition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

/// Install `/health` and `/metrics` into `routes`.
pub fn install(routes: &mut Routes, collector: Arc<MetricsCollector>) {
    routes.get(HEALTH_PATH, health);
    routes.get(METRICS_PATH, move || metrics(Arc::clone(&collector)));
}
