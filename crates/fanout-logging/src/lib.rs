//! # fanout-logging
//!
//! Installs the global `tracing` subscriber.
//!
//! `RUST_LOG` always wins over the configured level. Output goes to stderr,
//! either as compact human-readable lines or as one JSON object per line
//! with the active span list attached.

#![deny(unsafe_code)]

use fanout_settings::{LogFormat, LogLevel, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors from subscriber setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directives did not parse.
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),
    /// A global subscriber was already set.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Build the level filter.
///
/// `directives` (normally the contents of `RUST_LOG`) take precedence over
/// `level` when present and non-empty.
pub fn build_filter(level: LogLevel, directives: Option<&str>) -> Result<EnvFilter, LoggingError> {
    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::try_new(level.as_filter_str())?),
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_subscriber(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = match build_filter(settings.level, rust_log.as_deref()) {
        Ok(filter) => filter,
        // A broken RUST_LOG should not silence the server.
        Err(_) => build_filter(settings.level, None)?,
    };

    let (json, pretty) = match settings.format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;
    tracing::debug!(level = settings.level.as_filter_str(), "logging initialized");
    Ok(())
}
