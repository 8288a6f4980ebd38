//! apikit server library.
//!
//! Assembles HTTP services out of independently registered [`Service`]s with
//! uniform cross-cutting behavior: request logging, OTLP tracing, Prometheus
//! request metrics, and fixed `/health` + `/metrics` routes. Consumed by the
//! binary (`main.rs`), by host applications, and by integration tests.

pub mod config;
pub mod error;
pub mod obs;
pub mod ops;
pub mod server;
pub mod service;
pub mod services;

pub use error::{ApiError, JsonBody};
pub use obs::metrics::MetricsCollector;
pub use server::{Lifecycle, Server};
pub use service::{Routes, Service};
