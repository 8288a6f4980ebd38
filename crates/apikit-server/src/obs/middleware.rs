//! Fixed per-request middleware chain.
//!
//! Order, outermost first: request logger, trace span, metrics timer. Each
//! layer is observational only; none of them rewrites the response or
//! short-circuits the inner service.

use std::sync::Arc;
use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use apikit_core::labels::ENDPOINT_UNMATCHED;

use crate::obs::metrics::{MetricsCollector, RequestObservation};

/// Route template for labels and span names; never the raw path.
fn endpoint_label(matched: Option<&MatchedPath>) -> &str {
    matched.map(MatchedPath::as_str).unwrap_or(ENDPOINT_UNMATCHED)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

// --------------------
// Request logger
// --------------------

/// One INFO line per response, with latency in milliseconds.
pub fn request_logger() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}

// --------------------
// Trace span
// --------------------

#[derive(Clone)]
pub struct SpanState {
    tracer: Arc<BoxedTracer>,
}

impl SpanState {
    pub fn new(tracer: BoxedTracer) -> Self {
        Self { tracer: Arc::new(tracer) }
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Open a server span per request, parented on any incoming W3C trace context.
///
/// The span's `opentelemetry::Context` is inserted into request extensions so
/// handlers can start child spans.
pub async fn trace_span(
    State(state): State<SpanState>,
    matched: Option<MatchedPath>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_owned();
    let route = endpoint_label(matched.as_ref()).to_owned();

    let parent = global::get_text_map_propagator(|p| p.extract(&HeaderExtractor(req.headers())));
    let span = state
        .tracer
        .span_builder(format!("{method} {route}"))
        .with_kind(SpanKind::Server)
        .with_attributes([
            KeyValue::new("http.request.method", method),
            KeyValue::new("http.route", route),
            KeyValue::new("url.path", req.uri().path().to_owned()),
        ])
        .start_with_context(&*state.tracer, &parent);
    let cx = parent.with_span(span);
    req.extensions_mut().insert(cx.clone());

    let response = next.run(req).await;

    let status = response.status();
    let span = cx.span();
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status.as_u16()),
    ));
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    }
    span.end();

    response
}

// --------------------
// Metrics timer
// --------------------

/// Time the request and record it once the inner service has produced a response.
pub async fn track_metrics(
    State(metrics): State<Arc<MetricsCollector>>,
    matched: Option<MatchedPath>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let endpoint = endpoint_label(matched.as_ref()).to_owned();
    let request_bytes = content_length(req.headers()).unwrap_or(0);

    let response = next.run(req).await;

    let hint = response.body().size_hint();
    let response_bytes = hint
        .exact()
        .or_else(|| content_length(response.headers()))
        .unwrap_or_else(|| hint.lower());

    metrics.observe(&RequestObservation {
        method: method.as_str(),
        endpoint: &endpoint,
        status: response.status().as_u16(),
        elapsed: start.elapsed(),
        request_bytes,
        response_bytes,
    });

    response
}
