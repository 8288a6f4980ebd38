//! Log subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use apikit_core::error::{ApiKitError, Result};

use crate::config::LoggingSection;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns an error instead of panicking when a subscriber is already set.
pub fn init_logging(cfg: &LoggingSection) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&cfg.level)))
        .map_err(|e| ApiKitError::Config(format!("invalid log filter: {e}")))?;

    let fmt_layer = if cfg.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).compact().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ApiKitError::Internal(format!("logging already initialized: {e}")))
}

fn default_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    format!("{level},h2=info,hyper=info,tower=info,tonic=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_keep_transport_noise_down() {
        let d = default_directives("DEBUG");
        assert!(d.starts_with("debug,"));
        assert!(EnvFilter::try_new(d).is_ok());
    }
}
