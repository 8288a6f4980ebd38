//! Span exporter lifecycle.
//!
//! [`init_tracer`] never fails: an empty exporter address disables tracing
//! without touching the network, and an exporter that cannot be constructed
//! is logged and treated the same way. The returned [`TracerGuard`] flushes
//! and closes the exporter exactly once, either through [`TracerGuard::shutdown`]
//! or when it is dropped.

use std::time::Duration;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_SERVICE_NAME: &str = "apikit";

/// Owns the tracer provider for the lifetime of `Server::start`.
pub struct TracerGuard {
    provider: Option<SdkTracerProvider>,
    service_name: String,
}

impl TracerGuard {
    fn disabled(service_name: String) -> Self {
        Self { provider: None, service_name }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Flush buffered spans and close the exporter.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        match provider.shutdown() {
            Ok(()) => tracing::info!(service = %self.service_name, "tracer flushed and shut down"),
            Err(e) => tracing::warn!(service = %self.service_name, error = %e, "tracer shutdown failed"),
        }
    }
}

impl Drop for TracerGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tracer from the global provider; spans are dropped unless [`init_tracer`]
/// installed an exporter.
pub fn tracer_for(service_name: &str) -> BoxedTracer {
    global::tracer(service_name_or_default(service_name))
}

fn service_name_or_default(service_name: &str) -> String {
    if service_name.trim().is_empty() {
        FALLBACK_SERVICE_NAME.to_string()
    } else {
        service_name.to_string()
    }
}

/// Initialize span export to `exporter_address` (`host:port` or a full URL).
pub fn init_tracer(exporter_address: &str, service_name: &str) -> TracerGuard {
    let service_name = service_name_or_default(service_name);

    let address = exporter_address.trim();
    if address.is_empty() {
        tracing::debug!(service = %service_name, "no exporter configured, tracing disabled");
        return TracerGuard::disabled(service_name);
    }

    let endpoint = normalize_endpoint(address);
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            tracing::warn!(%endpoint, error = %e, "span exporter unavailable, serving without tracing");
            return TracerGuard::disabled(service_name);
        }
    };

    let resource = Resource::builder()
        .with_attributes([KeyValue::new("service.name", service_name.clone())])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource)
        .build();

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());

    tracing::info!(%endpoint, service = %service_name, "tracing enabled");

    TracerGuard {
        provider: Some(provider),
        service_name,
    }
}

/// `host:port` -> `http://host:port`; URLs with a scheme pass through.
pub fn normalize_endpoint(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}
