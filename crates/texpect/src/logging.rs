//! Diagnostic logging setup.
//!
//! The library itself only emits `tracing` events. Embedders that do not
//! install their own subscriber can call [`init`] once at startup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ExpectError, Result};

/// Build the event filter for `config`.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ExpectError::config(format!("invalid log level '{}': {e}", config.level)))
}

/// Install a global `tracing` subscriber writing to stderr.
///
/// # Errors
///
/// Fails if the level directive is invalid or a global subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_ansi(config.ansi).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_ansi(config.ansi).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| ExpectError::config(format!("failed to install subscriber: {e}")))
}
