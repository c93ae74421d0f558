//! Structured JSON logging
//!
//! - One log line = one event, JSON encoded
//! - Event fields flattened to the top level
//! - Written to stderr; stdout carries the command response
//! - `RUST_LOG` overrides the configured level

use std::io;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use super::{ObservabilityError, ObservabilityResult};

/// Level used when neither `--log-level` nor `RUST_LOG` is given
pub const DEFAULT_LEVEL: &str = "info";

/// Installs the global JSON subscriber writing to stderr.
pub fn init(level: &str) -> ObservabilityResult<()> {
    let subscriber = build(level, io::stderr)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ObservabilityError::new(format!("Failed to install logger: {}", e)))
}

/// Builds the JSON subscriber over any writer.
pub fn build<W>(
    level: &str,
    writer: W,
) -> ObservabilityResult<impl tracing::Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| level.to_string());
    let filter = EnvFilter::try_new(&directives).map_err(|e| {
        ObservabilityError::new(format!("Invalid log filter '{}': {}", directives, e))
    })?;

    Ok(tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(writer)
        .finish())
}
