//! Index error types

use thiserror::Error;

use super::btree::EntryKey;
use crate::manifest::IndexDefinition;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Index maintenance errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Unique index already holds the key
    #[error("duplicate key error index: {index} dup key: {key}")]
    DuplicateKey { index: String, key: String },
}

impl IndexError {
    /// Builds a duplicate-key error rendered as `{ field: value, ... }`
    pub fn duplicate(definition: &IndexDefinition, key: &EntryKey) -> Self {
        let parts: Vec<String> = definition
            .keys
            .iter()
            .zip(&key.0)
            .map(|(field, part)| format!("{}: {}", field.field, part.key))
            .collect();

        IndexError::DuplicateKey {
            index: definition.name.clone(),
            key: format!("{{ {} }}", parts.join(", ")),
        }
    }

    /// Name of the index that rejected the write
    pub fn index(&self) -> &str {
        match self {
            IndexError::DuplicateKey { index, .. } => index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::{IndexKey, KeyPart};
    use crate::manifest::IndexSpec;

    #[test]
    fn test_duplicate_display() {
        let def = IndexSpec::keys().asc("username").unique().definition();
        let key = EntryKey(vec![KeyPart {
            key: IndexKey::String("alice".into()),
            descending: false,
        }]);

        let err = IndexError::duplicate(&def, &key);
        assert_eq!(err.index(), "username_1");
        assert_eq!(
            err.to_string(),
            "duplicate key error index: username_1 dup key: { username: \"alice\" }"
        );
    }
}
