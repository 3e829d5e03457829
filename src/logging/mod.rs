// Logging module for structured logging using the tracing crate

use std::error::Error;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Build the level filter: `RUST_LOG` when set, the configured level otherwise
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn Error>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| format!("invalid logging.level '{}': {}", config.level, e).into()),
    }
}

/// Initialize the tracing subscriber for structured logging
///
/// JSON lines on stdout by default, for log aggregation; `pretty` is meant
/// for local development.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter directive, or if a
/// global subscriber was already installed.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    let filter = env_filter(config)?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
            .map_err(|e| format!("Failed to initialize logging: {}", e))?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()
            .map_err(|e| format!("Failed to initialize logging: {}", e))?,
    }

    Ok(())
}
