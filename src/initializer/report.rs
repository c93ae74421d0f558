//! Outcome of an apply

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An index on a named collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRef {
    pub collection: String,
    pub name: String,
}

impl IndexRef {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }
}

/// What an apply created and what it found already in place
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub database: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub collections_created: Vec<String>,
    pub collections_present: Vec<String>,
    pub indexes_created: Vec<IndexRef>,
    pub indexes_present: Vec<IndexRef>,
}

impl ProvisionReport {
    pub(crate) fn begin(database: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            database: database.into(),
            started_at,
            finished_at: started_at,
            collections_created: Vec::new(),
            collections_present: Vec::new(),
            indexes_created: Vec::new(),
            indexes_present: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Structures created by this run
    pub fn created_count(&self) -> usize {
        self.collections_created.len() + self.indexes_created.len()
    }

    /// Whether the run found everything already in place
    pub fn is_noop(&self) -> bool {
        self.created_count() == 0
    }
}
