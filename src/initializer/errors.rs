//! Initializer error types
//!
//! Error codes:
//! - BBEAMS_MANIFEST_* (FATAL, before any database traffic)
//! - BBEAMS_TARGET_* (per target severity)
//! - BBEAMS_INIT_DRIFT (REPORT)
//! - BBEAMS_INIT_NOT_CONVERGED (REPORT)
//! - BBEAMS_INIT_DATABASE_MISMATCH (FATAL)

use thiserror::Error;

use super::plan::Conflict;
use crate::manifest::ManifestError;
use crate::target::{Severity, TargetError};

/// Result type for initializer operations
pub type InitResult<T> = Result<T, InitError>;

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Target(#[from] TargetError),

    /// Existing indexes differ from their declarations; nothing was changed
    #[error("schema drift, {} conflicting index(es): {}", .conflicts.len(), render(.conflicts))]
    Drift { conflicts: Vec<Conflict> },

    #[error("schema not converged: {pending} declared structure(s) missing")]
    NotConverged { pending: usize },

    #[error("manifest targets database '{manifest}' but the target is '{target}'")]
    DatabaseMismatch { manifest: String, target: String },
}

fn render(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(Conflict::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl InitError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            InitError::Manifest(e) => e.code(),
            InitError::Target(e) => e.code(),
            InitError::Drift { .. } => "BBEAMS_INIT_DRIFT",
            InitError::NotConverged { .. } => "BBEAMS_INIT_NOT_CONVERGED",
            InitError::DatabaseMismatch { .. } => "BBEAMS_INIT_DATABASE_MISMATCH",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            InitError::Target(e) => e.severity(),
            InitError::Drift { .. } | InitError::NotConverged { .. } => Severity::Report,
            InitError::Manifest(_) | InitError::DatabaseMismatch { .. } => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::ConflictReason;
    use crate::manifest::IndexSpec;

    #[test]
    fn test_codes() {
        assert_eq!(
            InitError::from(ManifestError::EmptyIndex("users".into())).code(),
            "BBEAMS_MANIFEST_EMPTY_INDEX"
        );
        assert_eq!(
            InitError::from(TargetError::Unreachable("timeout".into())).code(),
            "BBEAMS_TARGET_UNREACHABLE"
        );
        assert_eq!(InitError::NotConverged { pending: 3 }.code(), "BBEAMS_INIT_NOT_CONVERGED");
    }

    #[test]
    fn test_drift_is_reported_not_fatal() {
        let err = InitError::Drift {
            conflicts: vec![Conflict {
                collection: "users".into(),
                declared: IndexSpec::keys().asc("username").unique().definition(),
                existing: IndexSpec::keys().asc("username").definition(),
                reason: ConflictReason::OptionsDiffer,
            }],
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("schema drift, 1 conflicting index(es): users.username_1"));
    }

    #[test]
    fn test_connectivity_is_fatal() {
        assert!(InitError::from(TargetError::Unreachable("x".into())).is_fatal());
        assert!(InitError::from(TargetError::PermissionDenied("x".into())).is_fatal());
    }
}
