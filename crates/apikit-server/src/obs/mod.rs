//! Cross-cutting observability: logging setup, request metrics, and the
//! span exporter lifecycle.
//!
//! Metrics use the `prometheus` crate's registry and text encoder; spans are
//! exported over OTLP when an exporter address is configured.

pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod tracer;
