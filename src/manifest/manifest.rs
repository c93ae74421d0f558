//! The schema manifest and its structural checks

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{ManifestError, ManifestResult};
use super::types::{CollectionSpec, IndexSpec};

/// Database the platform stores its data in
pub const DEFAULT_DATABASE: &str = "bbeams_db";

/// Collection names
pub mod collections {
    pub const USERS: &str = "users";
    pub const DEPARTMENTS: &str = "departments";
    pub const DEVICES: &str = "devices";
    pub const POLICIES: &str = "policies";
    pub const ATTENDANCE_RECORDS: &str = "attendance_records";
    pub const LEAVE_REQUESTS: &str = "leave_requests";
}

/// Longest namespace (`<db>.<collection>`) the server accepts
const MAX_NAMESPACE_BYTES: usize = 255;

fn database_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^[^/\\. "$*<>:|?\x00]{1,63}$"#).expect("database name pattern compiles")
    })
}

/// Checks a database name against the server's naming rules.
pub fn validate_database_name(name: &str) -> ManifestResult<()> {
    if name.is_empty() {
        return Err(ManifestError::invalid_name("database", name, "must not be empty"));
    }
    if !database_name_pattern().is_match(name) {
        return Err(ManifestError::invalid_name(
            "database",
            name,
            "must be at most 63 bytes without / \\ . space \" $ * < > : | ?",
        ));
    }
    Ok(())
}

/// Checks a collection name against the server's naming rules.
pub fn validate_collection_name(database: &str, name: &str) -> ManifestResult<()> {
    if name.is_empty() {
        return Err(ManifestError::invalid_name("collection", name, "must not be empty"));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(ManifestError::invalid_name(
            "collection",
            name,
            "must not contain '$' or NUL",
        ));
    }
    if name.starts_with("system.") {
        return Err(ManifestError::invalid_name(
            "collection",
            name,
            "the 'system.' prefix is reserved",
        ));
    }
    if database.len() + 1 + name.len() > MAX_NAMESPACE_BYTES {
        return Err(ManifestError::invalid_name(
            "collection",
            name,
            format!("namespace exceeds {} bytes", MAX_NAMESPACE_BYTES),
        ));
    }
    Ok(())
}

/// The full set of collections and indexes a database must carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Target database
    pub database: String,
    /// Collections, in creation order
    pub collections: Vec<CollectionSpec>,
}

impl Manifest {
    /// An empty manifest for the given database
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: Vec::new(),
        }
    }

    /// Appends a collection declaration
    pub fn collection(mut self, spec: CollectionSpec) -> Self {
        self.collections.push(spec);
        self
    }

    /// The attendance platform schema, in [`DEFAULT_DATABASE`].
    pub fn bbeams() -> Self {
        Self::bbeams_in(DEFAULT_DATABASE)
    }

    /// The attendance platform schema, placed in another database.
    pub fn bbeams_in(database: impl Into<String>) -> Self {
        use collections::*;

        Manifest::new(database)
            .collection(
                CollectionSpec::new(USERS)
                    .index(IndexSpec::keys().asc("username").unique())
                    .index(IndexSpec::keys().asc("email").unique())
                    .index(IndexSpec::keys().asc("employee_id").unique().sparse())
                    .index(IndexSpec::keys().asc("department_id")),
            )
            .collection(CollectionSpec::new(DEPARTMENTS))
            .collection(CollectionSpec::new(DEVICES))
            .collection(CollectionSpec::new(POLICIES))
            .collection(
                CollectionSpec::new(ATTENDANCE_RECORDS)
                    .index(IndexSpec::keys().asc("user_id").desc("timestamp"))
                    .index(IndexSpec::keys().asc("device_id").desc("timestamp")),
            )
            .collection(
                CollectionSpec::new(LEAVE_REQUESTS)
                    .index(IndexSpec::keys().asc("user_id").asc("status"))
                    .index(IndexSpec::keys().asc("start_date").asc("end_date")),
            )
    }

    /// Looks up a collection declaration by name
    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Declared collection names, in creation order
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.name.as_str())
    }

    /// Total number of declared indexes
    pub fn index_count(&self) -> usize {
        self.collections.iter().map(|c| c.indexes.len()).sum()
    }

    /// Validates the manifest structure.
    ///
    /// - database and collection names follow server naming rules
    /// - collection names are unique
    /// - every index has at least one key, no repeated field, only 1 / -1 keys
    /// - index names are unique per collection
    pub fn validate(&self) -> ManifestResult<()> {
        validate_database_name(&self.database)?;

        let mut seen_collections = HashSet::new();
        for collection in &self.collections {
            validate_collection_name(&self.database, &collection.name)?;
            if !seen_collections.insert(collection.name.as_str()) {
                return Err(ManifestError::DuplicateCollection(collection.name.clone()));
            }

            let mut seen_indexes = HashSet::new();
            for index in &collection.indexes {
                validate_index(&collection.name, index)?;
                let name = index.name();
                if !seen_indexes.insert(name.clone()) {
                    return Err(ManifestError::DuplicateIndex {
                        collection: collection.name.clone(),
                        index: name,
                    });
                }
            }
        }

        Ok(())
    }
}

fn validate_index(collection: &str, index: &IndexSpec) -> ManifestResult<()> {
    if index.keys.is_empty() {
        return Err(ManifestError::EmptyIndex(collection.to_string()));
    }

    let mut fields = HashSet::new();
    for key in &index.keys {
        if !key.direction.is_ordered() {
            return Err(ManifestError::UnorderedKey {
                collection: collection.to_string(),
                index: index.name(),
                field: key.field.clone(),
            });
        }
        if !fields.insert(key.field.as_str()) {
            return Err(ManifestError::DuplicateField {
                collection: collection.to_string(),
                index: index.name(),
                field: key.field.clone(),
            });
        }
    }

    Ok(())
}
