//! Instrumented demo: a child span per job and a custom counter.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::{Extension, Json};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, Context, KeyValue};
use prometheus::core::Collector;
use prometheus::IntCounter;
use serde::Deserialize;
use serde_json::{json, Value};

use apikit_core::error::{ApiKitError, Result};

use crate::service::{Routes, Service};

const DEFAULT_WORK_MS: u64 = 25;
const MAX_WORK_MS: u64 = 100;

pub const JOBS_COMPLETED: &str = "jobs_completed_total";

/// `GET /api/v1/work?ms=<n>` sleeps `n` ms (capped) inside a `some-job` span.
pub struct WorkService {
    jobs: IntCounter,
}

impl WorkService {
    pub fn new() -> Result<Self> {
        let jobs = IntCounter::new(JOBS_COMPLETED, "Number of completed demo jobs")
            .map_err(|e| ApiKitError::Metrics(e.to_string()))?;
        Ok(Self { jobs })
    }

    /// Instruments to hand to `MetricsCollector::register_custom`.
    pub fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![Box::new(self.jobs.clone())]
    }
}

#[derive(Debug, Deserialize)]
struct WorkQuery {
    ms: Option<u64>,
}

async fn some_job(parent: &Context, work_ms: u64) {
    let tracer = global::tracer("some-job");
    let mut span = tracer.start_with_context("some-job", parent);
    span.set_attribute(KeyValue::new("work.ms", work_ms as i64));
    tokio::time::sleep(Duration::from_millis(work_ms)).await;
    span.end();
}

async fn work(
    State(jobs): State<IntCounter>,
    parent: Option<Extension<Context>>,
    Query(q): Query<WorkQuery>,
) -> Json<Value> {
    let work_ms = q.ms.unwrap_or(DEFAULT_WORK_MS).min(MAX_WORK_MS);
    let parent = parent.map(|Extension(cx)| cx).unwrap_or_default();

    some_job(&parent, work_ms).await;
    jobs.inc();

    Json(json!({ "message": format!("Worked {work_ms} ms") }))
}

impl Service for WorkService {
    fn name(&self) -> &str {
        "work"
    }

    fn register_routes(&self, routes: &mut Routes) {
        routes.route_with_state(Method::GET, "/api/v1/work", work, self.jobs.clone());
    }
}
