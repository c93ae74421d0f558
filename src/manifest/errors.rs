//! Manifest error types
//!
//! Error codes:
//! - BBEAMS_MANIFEST_INVALID_NAME
//! - BBEAMS_MANIFEST_DUPLICATE_COLLECTION
//! - BBEAMS_MANIFEST_EMPTY_INDEX
//! - BBEAMS_MANIFEST_DUPLICATE_FIELD
//! - BBEAMS_MANIFEST_DUPLICATE_INDEX
//! - BBEAMS_MANIFEST_UNORDERED_KEY
//!
//! Every manifest error is raised before any database traffic.

use thiserror::Error;

/// Result type for manifest operations
pub type ManifestResult<T> = Result<T, ManifestError>;

/// A manifest that does not describe a valid schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("collection '{0}' is declared more than once")]
    DuplicateCollection(String),

    #[error("index on '{0}' declares no keys")]
    EmptyIndex(String),

    #[error("index '{index}' on '{collection}' lists field '{field}' more than once")]
    DuplicateField {
        collection: String,
        index: String,
        field: String,
    },

    #[error("index '{index}' is declared more than once on '{collection}'")]
    DuplicateIndex { collection: String, index: String },

    #[error("index '{index}' on '{collection}' uses non-ordered key '{field}'")]
    UnorderedKey {
        collection: String,
        index: String,
        field: String,
    },
}

impl ManifestError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ManifestError::InvalidName { .. } => "BBEAMS_MANIFEST_INVALID_NAME",
            ManifestError::DuplicateCollection(_) => "BBEAMS_MANIFEST_DUPLICATE_COLLECTION",
            ManifestError::EmptyIndex(_) => "BBEAMS_MANIFEST_EMPTY_INDEX",
            ManifestError::DuplicateField { .. } => "BBEAMS_MANIFEST_DUPLICATE_FIELD",
            ManifestError::DuplicateIndex { .. } => "BBEAMS_MANIFEST_DUPLICATE_INDEX",
            ManifestError::UnorderedKey { .. } => "BBEAMS_MANIFEST_UNORDERED_KEY",
        }
    }

    pub(crate) fn invalid_name(
        kind: &'static str,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ManifestError::InvalidName {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }
}
