//! Observability for provisioning runs
//!
//! - Structured logging (JSON lines on stderr, via `tracing`)
//! - Typed lifecycle events
//!
//! # Usage
//!
//! ```ignore
//! use bbeams_provision::observability::{self, Event};
//!
//! observability::init("info")?;
//! tracing::info!(event = Event::IndexCreated.as_str(), collection = "users", "index created");
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{build, init, DEFAULT_LEVEL};

use std::fmt;

/// Observability error
///
/// Never fatal: a run without logs still provisions.
#[derive(Debug)]
pub struct ObservabilityError {
    message: String,
}

impl ObservabilityError {
    /// Create a new observability error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        "BBEAMS_OBSERVABILITY_FAILED"
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code(), self.message)
    }
}

impl std::error::Error for ObservabilityError {}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;
