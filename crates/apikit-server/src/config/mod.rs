//! Configuration loader.
//!
//! Resolution order is defaults, then the YAML file, then `APIKIT_*`
//! environment variables. A missing file is not an error; a malformed one is.

pub mod schema;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use apikit_core::error::{ApiKitError, Result};

pub use schema::{LoggingSection, ServerConfig, ServerSection, TracingSection};

/// Default config file looked up by the binary.
pub const DEFAULT_CONFIG_FILE: &str = "apikit.yaml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "APIKIT_";

/// Typed server config plus the raw document it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ServerConfig,
    /// False when the file was missing and defaults were used.
    pub file_found: bool,
    raw: serde_yaml::Value,
}

impl LoadedConfig {
    /// Deserialize a host-application section (e.g. `app:`) into `T`.
    ///
    /// A missing section deserializes from an empty mapping, so `T` must
    /// supply defaults for everything it needs.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .raw
            .get(key)
            .cloned()
            .unwrap_or_else(|| serde_yaml::Value::Mapping(Default::default()));
        serde_yaml::from_value(value)
            .map_err(|e| ApiKitError::ConfigParse(format!("section {key}: {e}")))
    }
}

/// Load from `path`, falling back to defaults when the file does not exist,
/// then apply process environment overrides.
pub fn load(path: impl AsRef<Path>) -> Result<LoadedConfig> {
    let path = path.as_ref();
    let (source, file_found) = match fs::read_to_string(path) {
        Ok(s) => (s, true),
        // Reported by the caller through `file_found`, once logging is up.
        Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), false),
        Err(e) => {
            return Err(ApiKitError::Config(format!("read {} failed: {e}", path.display())));
        }
    };
    let mut loaded = load_with_env(&source, |key| std::env::var(key).ok())?;
    loaded.file_found = file_found;
    Ok(loaded)
}

/// Parse and validate a YAML document without consulting the environment.
pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    Ok(load_with_env(s, |_| None)?.config)
}

/// Parse a YAML document and apply overrides resolved through `lookup`.
pub fn load_with_env<F>(s: &str, lookup: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let raw: serde_yaml::Value = if s.trim().is_empty() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        serde_yaml::from_str(s).map_err(|e| ApiKitError::ConfigParse(format!("invalid yaml: {e}")))?
    };

    let mut config: ServerConfig = serde_yaml::from_value(raw.clone())
        .map_err(|e| ApiKitError::ConfigParse(format!("invalid config: {e}")))?;
    config.normalize();
    apply_env_overrides(&mut config, lookup)?;
    config.validate()?;

    Ok(LoadedConfig {
        config,
        file_found: true,
        raw,
    })
}

fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(host) = var("HOST") {
        config.server.host = host;
    }
    if let Some(port) = var("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| ApiKitError::Config(format!("{ENV_PREFIX}PORT is not a valid port: {port}")))?;
    }
    if let Some(exporter) = var("EXPORTER") {
        config.tracing.exporter = exporter;
    }
    if let Some(name) = var("SERVICE_NAME") {
        config.tracing.service_name = name;
    }
    if let Some(level) = var("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("LOG_JSON") {
        config.logging.json = match json.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                return Err(ApiKitError::Config(format!(
                    "{ENV_PREFIX}LOG_JSON must be a boolean, got {json}"
                )))
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_file_values() {
        let yaml = "server:\n  port: 9000\ntracing:\n  exporter: \"\"\n";
        let loaded = load_with_env(
            yaml,
            env(&[("APIKIT_PORT", "9100"), ("APIKIT_EXPORTER", "otel:4317")]),
        )
        .unwrap();
        assert_eq!(loaded.config.server.port, 9100);
        assert_eq!(loaded.config.tracing.exporter, "otel:4317");
        assert!(loaded.config.tracing.enabled());
    }

    #[test]
    fn invalid_env_port_is_fatal() {
        let err = load_with_env("", env(&[("APIKIT_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ApiKitError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_env_bool_is_fatal() {
        let err = load_with_env("", env(&[("APIKIT_LOG_JSON", "maybe")])).unwrap_err();
        assert!(matches!(err, ApiKitError::Config(_)));
    }

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = load_from_str("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(!cfg.tracing.enabled());
        assert_eq!(cfg.tracing.service_name, "apikit");
        assert_eq!(cfg.logging.level, "info");
    }
}
