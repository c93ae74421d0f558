//! Existing-versus-declared index classification
//!
//! Rules, in order:
//! 1. `_id_` is never compared
//! 2. Same name: identical keys and options is present; otherwise a conflict
//! 3. Same key pattern under another name: identical options is present;
//!    otherwise a conflict
//! 4. Nothing matches: absent

use std::fmt;

use serde::Serialize;

use crate::manifest::IndexDefinition;
use crate::target::ID_INDEX_NAME;

/// Why an existing index cannot stand in for a declared one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// The declared name holds a different key pattern
    KeysDiffer,
    /// The key pattern matches but the options differ
    OptionsDiffer,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::KeysDiffer => "keys differ",
            ConflictReason::OptionsDiffer => "options differ",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a declared index on the live collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexState {
    Absent,
    /// An equivalent index exists under `name`
    Present { name: String },
    Conflict {
        existing: IndexDefinition,
        reason: ConflictReason,
    },
}

/// Classifies a declared index against a collection's existing indexes.
pub fn classify_index(existing: &[IndexDefinition], declared: &IndexDefinition) -> IndexState {
    let candidates = || existing.iter().filter(|e| e.name != ID_INDEX_NAME);

    if let Some(named) = candidates().find(|e| e.name == declared.name) {
        let reason = if !named.same_keys(declared) {
            ConflictReason::KeysDiffer
        } else if !named.same_options(declared) {
            ConflictReason::OptionsDiffer
        } else {
            return IndexState::Present {
                name: named.name.clone(),
            };
        };
        return IndexState::Conflict {
            existing: named.clone(),
            reason,
        };
    }

    match candidates().find(|e| e.same_keys(declared)) {
        Some(same) if same.same_options(declared) => IndexState::Present {
            name: same.name.clone(),
        },
        Some(same) => IndexState::Conflict {
            existing: same.clone(),
            reason: ConflictReason::OptionsDiffer,
        },
        None => IndexState::Absent,
    }
}
