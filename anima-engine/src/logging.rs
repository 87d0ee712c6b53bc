//! Logging bootstrap for hosts embedding the engine.

use anima_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

use crate::error::{EngineError, Result};

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `general.log_level`. With
/// `general.log_format = "json"` every event is one JSON line.
///
/// # Errors
///
/// Returns [`EngineError::Logging`] if the level string is not a valid
/// filter or a global subscriber is already installed.
pub fn init_logging(config: &GeneralConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| EngineError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if config.log_format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_fails_cleanly() {
        let config = GeneralConfig::default();
        // Another test may have installed one already; either way the
        // second call must report an error rather than panic.
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(EngineError::Logging(_))));
    }
}
