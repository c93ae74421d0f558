//! Target error types
//!
//! Error codes:
//! - BBEAMS_TARGET_UNREACHABLE (FATAL)
//! - BBEAMS_TARGET_PERMISSION_DENIED (FATAL)
//! - BBEAMS_TARGET_INDEX_CONFLICT (REPORT)
//! - BBEAMS_TARGET_DUPLICATE_KEY (REJECT)
//! - BBEAMS_TARGET_INVALID_REQUEST (REJECT)
//! - BBEAMS_TARGET_SERVER_ERROR (FATAL)

use std::fmt;

use thiserror::Error;

use crate::index::IndexError;

/// Result type for target operations
pub type TargetResult<T> = Result<T, TargetError>;

/// How an error must be handled by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The single request failed; others may proceed
    Reject,
    /// Must be surfaced to an operator, never resolved automatically
    Report,
    /// Provisioning must abort
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Report => write!(f, "REPORT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Failures raised by a database target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("database unreachable: {0}")]
    Unreachable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("index '{index}' on '{collection}' conflicts with an existing index: {message}")]
    IndexConflict {
        collection: String,
        index: String,
        message: String,
    },

    #[error("E11000 duplicate key error collection: {collection} index: {index} dup key: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server error {code} ({code_name}): {message}")]
    Server {
        code: i32,
        code_name: String,
        message: String,
    },
}

impl TargetError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            TargetError::Unreachable(_) => "BBEAMS_TARGET_UNREACHABLE",
            TargetError::PermissionDenied(_) => "BBEAMS_TARGET_PERMISSION_DENIED",
            TargetError::IndexConflict { .. } => "BBEAMS_TARGET_INDEX_CONFLICT",
            TargetError::DuplicateKey { .. } => "BBEAMS_TARGET_DUPLICATE_KEY",
            TargetError::InvalidRequest(_) => "BBEAMS_TARGET_INVALID_REQUEST",
            TargetError::Server { .. } => "BBEAMS_TARGET_SERVER_ERROR",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            TargetError::Unreachable(_)
            | TargetError::PermissionDenied(_)
            | TargetError::Server { .. } => Severity::Fatal,
            TargetError::IndexConflict { .. } => Severity::Report,
            TargetError::DuplicateKey { .. } | TargetError::InvalidRequest(_) => Severity::Reject,
        }
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Wraps an index violation with its namespace
    pub fn from_index(namespace: impl Into<String>, err: IndexError) -> Self {
        match err {
            IndexError::DuplicateKey { index, key } => TargetError::DuplicateKey {
                collection: namespace.into(),
                index,
                key,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_taxonomy() {
        assert!(TargetError::Unreachable("timeout".into()).is_fatal());
        assert!(TargetError::PermissionDenied("not authorized".into()).is_fatal());
        assert_eq!(
            TargetError::IndexConflict {
                collection: "users".into(),
                index: "username_1".into(),
                message: "options differ".into(),
            }
            .severity(),
            Severity::Report
        );
        assert_eq!(
            TargetError::InvalidRequest("bad".into()).severity(),
            Severity::Reject
        );
    }

    #[test]
    fn test_duplicate_key_display() {
        let err = TargetError::from_index(
            "bbeams_db.users",
            IndexError::DuplicateKey {
                index: "username_1".into(),
                key: "{ username: \"alice\" }".into(),
            },
        );
        assert_eq!(err.code(), "BBEAMS_TARGET_DUPLICATE_KEY");
        assert_eq!(
            err.to_string(),
            "E11000 duplicate key error collection: bbeams_db.users index: username_1 dup key: { username: \"alice\" }"
        );
    }
}
