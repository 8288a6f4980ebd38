//! apikit-server
//!
//! `apikit-server start [--config apikit.yaml] [--port 8080] [--exporter host:port]`
//! - Config: YAML file, then `APIKIT_*` environment, then flags
//! - Demo services: hello, echo, instrumented work
//! - Non-zero exit on any startup or serve failure

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use apikit_core::error::Result;
use apikit_server::config::{self, DEFAULT_CONFIG_FILE};
use apikit_server::obs::logging;
use apikit_server::services::{EchoService, HelloService, WorkService};
use apikit_server::{MetricsCollector, Server};

#[derive(Debug, Parser)]
#[command(name = "apikit-server", about = "Run an instrumented API server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Starts the API server
    Start(StartArgs),
}

#[derive(Debug, clap::Args)]
struct StartArgs {
    /// YAML config file (missing file falls back to defaults)
    #[arg(long, env = "APIKIT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Port to bind the API server
    #[arg(long, env = "APIKIT_PORT")]
    port: Option<u16>,

    /// Address to bind the API server
    #[arg(long, env = "APIKIT_HOST")]
    host: Option<String>,

    /// Address of the OTLP exporter (host:port); empty disables tracing
    #[arg(long, env = "APIKIT_EXPORTER")]
    exporter: Option<String>,

    /// Service name reported on spans
    #[arg(long, env = "APIKIT_SERVICE_NAME")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let Cli { command: Command::Start(args) } = Cli::parse();

    match start(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.client_code().as_str(), "apikit-server exiting");
            eprintln!("apikit-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let loaded = config::load(&args.config)?;
    let file_found = loaded.file_found;
    let mut cfg = loaded.config;
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(exporter) = args.exporter {
        cfg.tracing.exporter = exporter;
    }
    if let Some(name) = args.name {
        cfg.tracing.service_name = name;
    }
    cfg.validate()?;

    logging::init_logging(&cfg.logging)?;
    if !file_found {
        tracing::warn!(path = %args.config.display(), "config file not found, using defaults and environment");
    }
    tracing::info!(
        address = %cfg.server.bind_address(),
        tracing = cfg.tracing.enabled(),
        service = %cfg.tracing.service_name,
        "configuration loaded"
    );

    let metrics = Arc::new(MetricsCollector::new()?);
    let work = WorkService::new()?;
    metrics.register_custom(work.collectors())?;

    let mut server = Server::from_config(&cfg, metrics);
    server.register_service(HelloService::new())?;
    server.register_service(EchoService::new())?;
    server.register_service(work)?;

    server.start().await
}
