//! Process metrics registry and the built-in HTTP instruments.
//!
//! One `MetricsCollector` is constructed explicitly at startup and shared via
//! `Arc` with the server and with any host code that registers custom
//! instruments. Names are claimed in a ledger before anything reaches the
//! prometheus registry, so a duplicate name is rejected up front instead of
//! being overwritten or silently merged.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::core::Collector;
#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    exponential_buckets, linear_buckets, Encoder, HistogramOpts, HistogramVec, IntCounterVec,
    Opts, Registry, TextEncoder,
};

use apikit_core::error::{ApiKitError, Result};
use apikit_core::labels::{
    self, DURATION_BUCKET_COUNT, DURATION_BUCKET_START, DURATION_BUCKET_WIDTH, SIZE_BUCKET_COUNT,
    SIZE_BUCKET_FACTOR, SIZE_BUCKET_START,
};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const REQUEST_SIZE: &str = "http_request_size_bytes";
pub const RESPONSE_SIZE: &str = "http_response_size_bytes";

/// Content type of the `/metrics` response.
pub const EXPOSITION_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const BUILTIN: &str = "builtin";
const CUSTOM: &str = "custom";

/// One completed request, as seen by the metrics middleware.
#[derive(Debug, Clone)]
pub struct RequestObservation<'a> {
    pub method: &'a str,
    pub endpoint: &'a str,
    pub status: u16,
    pub elapsed: Duration,
    pub request_bytes: u64,
    pub response_bytes: u64,
}

pub struct MetricsCollector {
    registry: Registry,
    /// metric name -> origin ("builtin" / "custom")
    names: DashMap<String, &'static str>,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    request_size: HistogramVec,
    response_size: HistogramVec,
}

impl MetricsCollector {
    /// Build a fresh registry with the built-in HTTP instruments registered.
    pub fn new() -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(REQUESTS_TOTAL, "Number of HTTP operations"),
            &["method", "endpoint", "status"],
        )
        .map_err(metrics_err)?;

        let duration_buckets =
            linear_buckets(DURATION_BUCKET_START, DURATION_BUCKET_WIDTH, DURATION_BUCKET_COUNT)
                .map_err(metrics_err)?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION, "Duration of HTTP requests").buckets(duration_buckets),
            &["method", "endpoint", "status"],
        )
        .map_err(metrics_err)?;

        let size_buckets = exponential_buckets(SIZE_BUCKET_START, SIZE_BUCKET_FACTOR, SIZE_BUCKET_COUNT)
            .map_err(metrics_err)?;
        let request_size = HistogramVec::new(
            HistogramOpts::new(REQUEST_SIZE, "Size of HTTP requests").buckets(size_buckets.clone()),
            &["method", "endpoint"],
        )
        .map_err(metrics_err)?;
        let response_size = HistogramVec::new(
            HistogramOpts::new(RESPONSE_SIZE, "Size of HTTP responses").buckets(size_buckets),
            &["method", "endpoint", "status"],
        )
        .map_err(metrics_err)?;

        let collector = Self {
            registry: Registry::new(),
            names: DashMap::new(),
            requests_total,
            request_duration,
            request_size,
            response_size,
        };

        collector.register_as(Box::new(collector.requests_total.clone()), BUILTIN)?;
        collector.register_as(Box::new(collector.request_duration.clone()), BUILTIN)?;
        collector.register_as(Box::new(collector.request_size.clone()), BUILTIN)?;
        collector.register_as(Box::new(collector.response_size.clone()), BUILTIN)?;
        // cpu, memory, fds and start time of this process
        #[cfg(target_os = "linux")]
        collector.register_as(Box::new(ProcessCollector::for_self()), BUILTIN)?;

        Ok(collector)
    }

    /// Register host-application instruments into the shared registry.
    ///
    /// Stops at the first rejected collector. A name that is already present
    /// (built-in or custom) is a `DuplicateMetric` error, which callers are
    /// expected to treat as fatal before serving traffic.
    pub fn register_custom<I>(&self, collectors: I) -> Result<()>
    where
        I: IntoIterator<Item = Box<dyn Collector>>,
    {
        for collector in collectors {
            self.register_as(collector, CUSTOM)?;
        }
        Ok(())
    }

    fn register_as(&self, collector: Box<dyn Collector>, origin: &'static str) -> Result<()> {
        let names: Vec<String> = collector.desc().iter().map(|d| d.fq_name.clone()).collect();

        // Claim all names or none.
        let mut claimed: Vec<&str> = Vec::with_capacity(names.len());
        for name in &names {
            match self.names.entry(name.clone()) {
                Entry::Occupied(existing) => {
                    let previous = *existing.get();
                    drop(existing);
                    for n in &claimed {
                        self.names.remove(*n);
                    }
                    tracing::error!(metric = %name, previous_origin = previous, origin, "duplicate metric registration");
                    return Err(ApiKitError::DuplicateMetric(name.clone()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(origin);
                    claimed.push(name);
                }
            }
        }

        if let Err(e) = self.registry.register(collector) {
            for n in &claimed {
                self.names.remove(*n);
            }
            return Err(match e {
                prometheus::Error::AlreadyReg => ApiKitError::DuplicateMetric(names.join(",")),
                other => metrics_err(other),
            });
        }

        tracing::debug!(metrics = ?names, origin, "metrics registered");
        Ok(())
    }

    /// Whether `name` has been claimed in this registry.
    pub fn is_registered(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Record one completed request into every built-in instrument.
    pub fn observe(&self, obs: &RequestObservation<'_>) {
        let method = labels::method_label(obs.method);
        let status = labels::status_label(obs.status);

        self.requests_total
            .with_label_values(&[method, obs.endpoint, status])
            .inc();
        self.request_duration
            .with_label_values(&[method, obs.endpoint, status])
            .observe(obs.elapsed.as_secs_f64());
        self.request_size
            .with_label_values(&[method, obs.endpoint])
            .observe(obs.request_bytes as f64);
        self.response_size
            .with_label_values(&[method, obs.endpoint, status])
            .observe(obs.response_bytes as f64);
    }

    /// Render every registered collector in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(metrics_err)?;
        String::from_utf8(buf).map_err(|e| ApiKitError::Metrics(format!("exposition is not utf-8: {e}")))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn requests_total(&self) -> &IntCounterVec {
        &self.requests_total
    }

    pub fn request_duration(&self) -> &HistogramVec {
        &self.request_duration
    }
}

fn metrics_err(e: prometheus::Error) -> ApiKitError {
    ApiKitError::Metrics(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::IntCounter;

    fn observation(status: u16) -> RequestObservation<'static> {
        RequestObservation {
            method: "GET",
            endpoint: "/api/v1/",
            status,
            elapsed: Duration::from_millis(15),
            request_bytes: 0,
            response_bytes: 2048,
        }
    }

    #[test]
    fn builtins_are_claimed() {
        let m = MetricsCollector::new().unwrap();
        for name in [REQUESTS_TOTAL, REQUEST_DURATION, REQUEST_SIZE, RESPONSE_SIZE] {
            assert!(m.is_registered(name), "{name} not registered");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_metrics_are_builtin() {
        let m = MetricsCollector::new().unwrap();
        assert!(m.is_registered("process_cpu_seconds_total"));
        assert!(m.is_registered("process_resident_memory_bytes"));

        let shadow = IntCounter::new("process_cpu_seconds_total", "shadow").unwrap();
        let err = m.register_custom([Box::new(shadow) as Box<dyn Collector>]).unwrap_err();
        assert!(matches!(err, ApiKitError::DuplicateMetric(_)));

        let text = m.render().unwrap();
        assert!(text.contains("process_cpu_seconds_total"));
        assert!(text.contains("process_start_time_seconds"));
    }

    #[test]
    fn status_labels_split_success_and_error() {
        let m = MetricsCollector::new().unwrap();
        m.observe(&observation(200));
        m.observe(&observation(302));
        m.observe(&observation(404));

        let total = m.requests_total();
        assert_eq!(total.with_label_values(&["GET", "/api/v1/", "success"]).get(), 2);
        assert_eq!(total.with_label_values(&["GET", "/api/v1/", "error"]).get(), 1);

        let hist = m.request_duration();
        assert_eq!(hist.with_label_values(&["GET", "/api/v1/", "success"]).get_sample_count(), 2);
        assert_eq!(hist.with_label_values(&["GET", "/api/v1/", "error"]).get_sample_count(), 1);
    }

    #[test]
    fn duplicate_custom_name_is_rejected() {
        let m = MetricsCollector::new().unwrap();
        let first = IntCounter::new("my_custom_counter", "first").unwrap();
        let second = IntCounter::new("my_custom_counter", "second").unwrap();

        m.register_custom([Box::new(first) as Box<dyn Collector>]).unwrap();
        let err = m
            .register_custom([Box::new(second) as Box<dyn Collector>])
            .unwrap_err();
        assert!(matches!(err, ApiKitError::DuplicateMetric(ref n) if n == "my_custom_counter"));
        assert!(err.is_fatal());
    }

    #[test]
    fn custom_cannot_shadow_builtin() {
        let m = MetricsCollector::new().unwrap();
        let shadow = IntCounter::new(REQUESTS_TOTAL, "shadow").unwrap();
        let err = m
            .register_custom([Box::new(shadow) as Box<dyn Collector>])
            .unwrap_err();
        assert!(matches!(err, ApiKitError::DuplicateMetric(_)));
    }

    #[test]
    fn exposition_uses_configured_buckets() {
        let m = MetricsCollector::new().unwrap();
        m.observe(&observation(200));
        let text = m.render().unwrap();

        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains("http_request_duration_seconds_bucket{endpoint=\"/api/v1/\",method=\"GET\",status=\"success\",le=\"0.02\"} 1"));
        assert!(text.contains("http_response_size_bytes_bucket{endpoint=\"/api/v1/\",method=\"GET\",status=\"success\",le=\"2048\"} 1"));
        assert!(text.contains("le=\"524288\""));
    }
}
