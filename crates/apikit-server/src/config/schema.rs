use serde::Deserialize;
use apikit_core::error::{ApiKitError, Result};

/// Resolved server configuration.
///
/// Unknown keys are rejected inside every section, but the top level accepts
/// extra sections so host applications can keep their own keys in the same
/// file (see [`crate::config::LoadedConfig::section`]).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    /// Shorthand for `server.port`; wins over the nested key when both are set.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub tracing: TracingSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl ServerConfig {
    /// Fold the top-level `port` shorthand into `server.port`.
    pub(crate) fn normalize(&mut self) {
        if let Some(port) = self.port.take() {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ApiKitError::Config("server.port must be between 1 and 65535".into()));
        }
        if self.host.trim().is_empty() {
            return Err(ApiKitError::Config("server.host must not be empty".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracingSection {
    /// OTLP collector address (`host:port`). Empty disables tracing.
    #[serde(default)]
    pub exporter: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TracingSection {
    fn default() -> Self {
        Self {
            exporter: String::new(),
            service_name: default_service_name(),
        }
    }
}

impl TracingSection {
    pub fn enabled(&self) -> bool {
        !self.exporter.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingSection {
    pub fn validate(&self) -> Result<()> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ApiKitError::Config(format!(
                "logging.level must be one of trace/debug/info/warn/error, got {other}"
            ))),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_service_name() -> String {
    "apikit".into()
}
fn default_log_level() -> String {
    "info".into()
}
