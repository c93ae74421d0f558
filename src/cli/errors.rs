//! CLI-specific error types
//!
//! Every failure reaching the CLI is rendered as
//! `{"status":"error","code":...,"message":...}` and exits 1.

use std::fmt;
use std::io;

use crate::initializer::InitError;
use crate::manifest::ManifestError;
use crate::observability::ObservabilityError;
use crate::target::TargetError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file or flags invalid
    ConfigError,
    /// I/O error (stdout, config file)
    IoError,
    /// Logger or runtime could not start
    BootFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "BBEAMS_CLI_CONFIG_ERROR",
            Self::IoError => "BBEAMS_CLI_IO_ERROR",
            Self::BootFailed => "BBEAMS_CLI_BOOT_FAILED",
        }
    }
}

/// CLI error
///
/// Carries the stable code of whichever layer failed.
#[derive(Debug)]
pub struct CliError {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            details: None,
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured detail for the error envelope, if any
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ObservabilityError> for CliError {
    fn from(e: ObservabilityError) -> Self {
        Self::boot_failed(e.message())
    }
}

impl From<ManifestError> for CliError {
    fn from(e: ManifestError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

impl From<TargetError> for CliError {
    fn from(e: TargetError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

impl From<InitError> for CliError {
    fn from(e: InitError) -> Self {
        let details = match &e {
            InitError::Drift { conflicts } => serde_json::to_value(conflicts).ok(),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
