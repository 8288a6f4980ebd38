//! Server core: service registry, fixed middleware/route composition, and
//! the lifecycle `Configured -> Running -> Terminated`.
//!
//! `start` runs, in order:
//! 1. tracer initialization (guard held until `start` returns, by any path)
//! 2. the fixed middleware chain: request logger -> trace span -> metrics timer,
//!    wrapping every route installed below
//! 3. fixed routes `/health` and `/metrics`
//! 4. every registered service's `register_routes`, in registration order
//! 5. bind + accept loop until shutdown
//!
//! Steps 2-4 are exposed as [`Server::prepare`] so the composed router can be
//! driven in-process. axum attaches layers to an already-built router, so the
//! chain is applied last in code while still sitting ahead of every handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;

use apikit_core::error::{ApiKitError, Result};

use crate::config::ServerConfig;
use crate::obs::metrics::MetricsCollector;
use crate::obs::middleware::{self, SpanState};
use crate::obs::tracer::{self, TracerGuard};
use crate::ops;
use crate::service::{Routes, Service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Configured,
    Running,
    Terminated,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Configured => "configured",
            Lifecycle::Running => "running",
            Lifecycle::Terminated => "terminated",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Server {
    host: String,
    port: u16,
    exporter: String,
    name: String,
    routes: Routes,
    services: Vec<Box<dyn Service>>,
    metrics: Arc<MetricsCollector>,
    state: Lifecycle,
}

impl Server {
    /// A server on `0.0.0.0:<port>` with tracing disabled and no services.
    pub fn new(port: u16, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            host: "0.0.0.0".into(),
            port,
            exporter: String::new(),
            name: String::new(),
            routes: Routes::new(),
            services: Vec::new(),
            metrics,
            state: Lifecycle::Configured,
        }
    }

    pub fn from_config(cfg: &ServerConfig, metrics: Arc<MetricsCollector>) -> Self {
        Self::new(cfg.server.port, metrics)
            .with_host(cfg.server.host.clone())
            .with_exporter(cfg.tracing.exporter.clone())
            .with_name(cfg.tracing.service_name.clone())
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// OTLP exporter address; empty disables tracing.
    pub fn with_exporter(mut self, exporter: impl Into<String>) -> Self {
        self.exporter = exporter.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    fn expect_state(&self, expected: Lifecycle) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ApiKitError::InvalidState {
                expected: expected.as_str(),
                found: self.state.as_str(),
            })
        }
    }

    /// Append a service. Only valid while `Configured`.
    pub fn register_service<S>(&mut self, service: S) -> Result<()>
    where
        S: Service + 'static,
    {
        self.register_boxed(Box::new(service))
    }

    pub fn register_boxed(&mut self, service: Box<dyn Service>) -> Result<()> {
        self.expect_state(Lifecycle::Configured)?;
        tracing::debug!(service = service.name(), position = self.services.len(), "service registered");
        self.services.push(service);
        Ok(())
    }

    /// Compose fixed routes, service routes, and the middleware chain.
    ///
    /// Moves the server to `Running`; every service's `register_routes` is
    /// called here and never again.
    pub fn prepare(&mut self) -> Result<Router> {
        self.expect_state(Lifecycle::Configured)?;
        self.state = Lifecycle::Running;

        let mut routes = std::mem::take(&mut self.routes);
        ops::install(&mut routes, self.metrics());

        for service in &self.services {
            routes.set_owner(service.name());
            service.register_routes(&mut routes);
        }
        tracing::info!(services = self.services.len(), routes = routes.len(), "routes installed");

        let spans = SpanState::new(tracer::tracer_for(&self.name));
        // Later `.layer` calls wrap earlier ones: the logger ends up outermost.
        let router = routes
            .into_router()?
            .layer(from_fn_with_state(self.metrics(), middleware::track_metrics))
            .layer(from_fn_with_state(spans, middleware::trace_span))
            .layer(middleware::request_logger());

        Ok(router)
    }

    /// Bind `host:port` and serve until Ctrl-C.
    pub async fn start(&mut self) -> Result<()> {
        self.launch(None, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn start_on<F>(&mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.launch(Some(listener), shutdown).await
    }

    async fn launch<F>(&mut self, listener: Option<TcpListener>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.expect_state(Lifecycle::Configured)?;

        // Released below; on unwinding the guard's drop releases it instead.
        let guard = tracer::init_tracer(&self.exporter, &self.name);
        let outcome = self.run(listener, shutdown).await;

        self.state = Lifecycle::Terminated;
        release_tracer(guard).await;

        match &outcome {
            Ok(()) => tracing::info!("server stopped"),
            Err(e) => tracing::error!(error = %e, "server terminated"),
        }
        outcome
    }

    async fn run<F>(&mut self, listener: Option<TcpListener>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.prepare()?;

        let listener = match listener {
            Some(l) => l,
            None => {
                let addr = format!("{}:{}", self.host, self.port);
                TcpListener::bind(&addr)
                    .await
                    .map_err(|source| ApiKitError::Bind { addr, source })?
            }
        };
        let local = listener.local_addr().map_err(ApiKitError::Serve)?;
        tracing::info!(address = %local, "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ApiKitError::Serve)
    }
}

/// Flush and close the exporter on the blocking pool; the provider's shutdown
/// blocks until the export timeout at worst.
async fn release_tracer(guard: TracerGuard) {
    if !guard.is_enabled() {
        return;
    }
    if let Err(e) = tokio::task::spawn_blocking(move || guard.shutdown()).await {
        tracing::warn!(error = %e, "tracer release task failed");
    }
}

/// Wait for Ctrl-C. If the handler cannot be installed, wait forever.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
