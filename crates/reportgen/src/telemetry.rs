//! Process-wide logging setup.
//!
//! `RUST_LOG` wins over `logging.level` when set. Records emitted through the
//! `log` facade are forwarded into the same subscriber.

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("Tracing subscriber already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Log bridge already installed: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| TelemetryError::Filter {
        filter: config.level.clone(),
        message: e.to_string(),
    })
}

/// Installs the global subscriber. Call once at process start.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json()),
        )?;
    } else {
        tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(true)),
        )?;
    }
    tracing_log::LogTracer::init()?;

    tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    Ok(())
}
