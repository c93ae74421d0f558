//! In-memory target
//!
//! A document store with the server's collection and index behavior:
//!
//! - Every collection carries an `_id_` index; `_id` is unique
//! - Inserting into or indexing a missing collection creates it
//! - `create_index` is a no-op for an identical index and a conflict for a
//!   different index holding the same name or key pattern
//! - Building a unique index over duplicate data fails with E11000
//!
//! Finds support equality filters and sorts, planned by [`plan_query`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};
use parking_lot::Mutex;

use super::errors::{TargetError, TargetResult};
use super::{SchemaTarget, ID_INDEX_NAME};
use crate::index::{lookup_path, DocId, EntryKey, IndexKey, IndexTree, KeyPart};
use crate::manifest::{validate_collection_name, Direction, IndexDefinition, IndexField, IndexSpec};
use crate::planner::{plan_query, ExplainPlan, QueryPlan, QueryShape};

/// Documents returned by [`MemoryTarget::find`], with the plan that produced them
#[derive(Debug, Clone)]
pub struct FindResult {
    pub plan: QueryPlan,
    pub documents: Vec<Document>,
}

#[derive(Debug)]
struct MemoryCollection {
    documents: BTreeMap<DocId, Document>,
    /// `_id_` first, then secondary indexes in creation order
    indexes: Vec<IndexTree>,
    next_id: DocId,
}

impl MemoryCollection {
    fn new() -> Self {
        let id_index = IndexDefinition {
            name: ID_INDEX_NAME.to_string(),
            keys: vec![IndexField::asc("_id")],
            options: Default::default(),
            extra: BTreeMap::new(),
        };
        Self {
            documents: BTreeMap::new(),
            indexes: vec![IndexTree::new(id_index)],
            next_id: 1,
        }
    }

    fn tree(&self, name: &str) -> Option<&IndexTree> {
        self.indexes.iter().find(|t| t.name() == name)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, MemoryCollection>,
    unreachable: bool,
    read_only: bool,
    schema_writes: usize,
}

impl MemoryState {
    fn reachable(&self) -> TargetResult<()> {
        if self.unreachable {
            return Err(TargetError::Unreachable(
                "No servers available for operation".to_string(),
            ));
        }
        Ok(())
    }

    fn writable(&self) -> TargetResult<()> {
        self.reachable()?;
        if self.read_only {
            return Err(TargetError::PermissionDenied(
                "not authorized to execute write command".to_string(),
            ));
        }
        Ok(())
    }

    fn collection_mut(&mut self, name: &str) -> &mut MemoryCollection {
        if !self.collections.contains_key(name) {
            self.schema_writes += 1;
        }
        self.collections
            .entry(name.to_string())
            .or_insert_with(MemoryCollection::new)
    }
}

/// A database held in memory
#[derive(Debug)]
pub struct MemoryTarget {
    database: String,
    state: Mutex<MemoryState>,
}

impl MemoryTarget {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Makes every subsequent operation fail as if no server answered
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Makes every subsequent write fail with a permission error
    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    /// Number of collections and indexes created so far
    pub fn schema_writes(&self) -> usize {
        self.state.lock().schema_writes
    }

    fn namespace(&self, collection: &str) -> String {
        format!("{}.{}", self.database, collection)
    }

    /// Creates an index from a full definition, including its name.
    ///
    /// Lets callers build the state an operator may have left behind, such
    /// as an index under a non-default name or with different options.
    pub fn create_index_definition(
        &self,
        collection: &str,
        definition: IndexDefinition,
    ) -> TargetResult<()> {
        let namespace = self.namespace(collection);
        let mut state = self.state.lock();
        state.writable()?;
        validate_collection_name(&self.database, collection)
            .map_err(|e| TargetError::InvalidRequest(e.to_string()))?;

        let coll = state.collection_mut(collection);
        for tree in &coll.indexes {
            let existing = tree.definition();
            if existing.name == definition.name {
                if existing == &definition {
                    return Ok(());
                }
                return Err(TargetError::IndexConflict {
                    collection: collection.to_string(),
                    index: definition.name,
                    message: format!(
                        "An existing index has the same name as the requested index: {}",
                        existing
                    ),
                });
            }
            if existing.same_keys(&definition) {
                return Err(TargetError::IndexConflict {
                    collection: collection.to_string(),
                    index: definition.name,
                    message: format!("Index already exists with a different name: {}", existing.name),
                });
            }
        }

        let mut tree = IndexTree::new(definition);
        for (id, document) in &coll.documents {
            tree.insert(document, *id)
                .map_err(|e| TargetError::from_index(&namespace, e))?;
        }
        coll.indexes.push(tree);
        state.schema_writes += 1;
        Ok(())
    }

    /// Inserts a document, assigning an ObjectId `_id` when absent.
    ///
    /// Returns the `_id`. Nothing is written if any unique index rejects the
    /// document.
    pub fn insert_one(&self, collection: &str, document: Document) -> TargetResult<Bson> {
        let namespace = self.namespace(collection);
        let mut state = self.state.lock();
        state.writable()?;
        validate_collection_name(&self.database, collection)
            .map_err(|e| TargetError::InvalidRequest(e.to_string()))?;

        let document = if document.contains_key("_id") {
            document
        } else {
            let mut with_id = doc! { "_id": ObjectId::new() };
            for (key, value) in document {
                with_id.insert(key, value);
            }
            with_id
        };
        let id_value = document.get("_id").cloned().unwrap_or(Bson::Null);

        let coll = state.collection_mut(collection);
        let id_key = IndexKey::from_bson(Some(&id_value));
        let id_taken = coll
            .tree(ID_INDEX_NAME)
            .is_some_and(|t| !t.scan_prefix(std::slice::from_ref(&id_key), false).is_empty());
        if id_taken {
            return Err(TargetError::DuplicateKey {
                collection: namespace,
                index: ID_INDEX_NAME.to_string(),
                key: format!("{{ _id: {} }}", id_key),
            });
        }

        for tree in &coll.indexes {
            tree.check(&document)
                .map_err(|e| TargetError::from_index(&namespace, e))?;
        }

        let id = coll.next_id;
        coll.next_id += 1;
        for tree in &mut coll.indexes {
            tree.insert(&document, id)
                .map_err(|e| TargetError::from_index(&namespace, e))?;
        }
        coll.documents.insert(id, document);
        Ok(id_value)
    }

    /// Number of documents in a collection; zero if it does not exist
    pub fn count_documents(&self, collection: &str) -> TargetResult<usize> {
        let state = self.state.lock();
        state.reachable()?;
        Ok(state
            .collections
            .get(collection)
            .map_or(0, |c| c.documents.len()))
    }

    /// Runs a find with an equality `filter` and a `sort` such as
    /// `{ "timestamp": -1 }`.
    pub fn find(
        &self,
        collection: &str,
        filter: &Document,
        sort: &Document,
    ) -> TargetResult<FindResult> {
        let shape = query_shape(collection, filter, sort)?;
        let state = self.state.lock();
        state.reachable()?;

        let Some(coll) = state.collections.get(collection) else {
            return Ok(FindResult {
                plan: plan_query(&[], &shape),
                documents: Vec::new(),
            });
        };

        let plan = plan_for(coll, &shape, filter);
        let candidates: Vec<DocId> = match plan.index_name().and_then(|name| coll.tree(name)) {
            Some(tree) => {
                let prefix: Vec<IndexKey> = tree.definition().keys[..plan.prefix_len]
                    .iter()
                    .map(|k| IndexKey::from_bson(filter.get(&k.field)))
                    .collect();
                tree.scan_prefix(&prefix, plan.reverse)
            }
            None => coll.documents.keys().copied().collect(),
        };

        let mut documents: Vec<Document> = candidates
            .iter()
            .filter_map(|id| coll.documents.get(id))
            .filter(|d| matches_filter(d, filter))
            .cloned()
            .collect();

        if plan.in_memory_sort {
            documents.sort_by_cached_key(|d| sort_key(d, &shape.sort));
        }

        Ok(FindResult { plan, documents })
    }

    /// Plans a find without running it
    pub fn explain(
        &self,
        collection: &str,
        filter: &Document,
        sort: &Document,
    ) -> TargetResult<ExplainPlan> {
        let shape = query_shape(collection, filter, sort)?;
        let state = self.state.lock();
        state.reachable()?;

        let plan = match state.collections.get(collection) {
            Some(coll) => plan_for(coll, &shape, filter),
            None => plan_query(&[], &shape),
        };
        Ok(ExplainPlan::from_plan(&plan))
    }
}

#[async_trait]
impl SchemaTarget for MemoryTarget {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> TargetResult<()> {
        self.state.lock().reachable()
    }

    async fn list_collections(&self) -> TargetResult<Vec<String>> {
        let state = self.state.lock();
        state.reachable()?;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> TargetResult<()> {
        let mut state = self.state.lock();
        state.writable()?;
        validate_collection_name(&self.database, name)
            .map_err(|e| TargetError::InvalidRequest(e.to_string()))?;
        state.collection_mut(name);
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> TargetResult<Vec<IndexDefinition>> {
        let state = self.state.lock();
        state.reachable()?;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.indexes.iter().map(|t| t.definition().clone()).collect())
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> TargetResult<()> {
        self.create_index_definition(collection, index.definition())
    }
}

/// Reads the filter and sort documents into a query shape
fn query_shape(collection: &str, filter: &Document, sort: &Document) -> TargetResult<QueryShape> {
    let mut shape = QueryShape::new(collection);

    for (field, value) in filter {
        let operator = field.starts_with('$')
            || matches!(value, Bson::Document(d) if d.keys().any(|k| k.starts_with('$')));
        if operator {
            return Err(TargetError::InvalidRequest(format!(
                "only equality filters are supported: {}",
                field
            )));
        }
        shape = shape.equals(field.as_str());
    }

    for (field, value) in sort {
        let number = match value {
            Bson::Int32(i) => Some(*i as f64),
            Bson::Int64(i) => Some(*i as f64),
            Bson::Double(f) => Some(*f),
            _ => None,
        };
        shape = match number.and_then(Direction::from_number) {
            Some(Direction::Ascending) => shape.sort_asc(field.as_str()),
            Some(Direction::Descending) => shape.sort_desc(field.as_str()),
            _ => {
                return Err(TargetError::InvalidRequest(format!(
                    "invalid sort direction for '{}': {}",
                    field, value
                )))
            }
        };
    }

    Ok(shape)
}

/// Plans over the indexes that can answer this filter. A sparse index is
/// only usable when the filter binds one of its fields to a non-null value,
/// since documents missing from it could otherwise match.
fn plan_for(coll: &MemoryCollection, shape: &QueryShape, filter: &Document) -> QueryPlan {
    let usable: Vec<IndexDefinition> = coll
        .indexes
        .iter()
        .map(IndexTree::definition)
        .filter(|d| {
            !d.options.sparse
                || d.keys
                    .iter()
                    .any(|k| matches!(filter.get(&k.field), Some(v) if *v != Bson::Null))
        })
        .cloned()
        .collect();
    plan_query(&usable, shape)
}

/// Equality match; a missing field equals null
fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(field, value)| {
        IndexKey::from_bson(lookup_path(document, field)) == IndexKey::from_bson(Some(value))
    })
}

fn sort_key(document: &Document, sort: &[IndexField]) -> EntryKey {
    EntryKey(
        sort.iter()
            .map(|s| KeyPart {
                key: IndexKey::from_bson(lookup_path(document, &s.field)),
                descending: s.direction == Direction::Descending,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ScanType;
    use mongodb::bson::DateTime;

    fn users() -> MemoryTarget {
        let target = MemoryTarget::new("bbeams_db");
        for spec in [
            IndexSpec::keys().asc("username").unique(),
            IndexSpec::keys().asc("email").unique(),
            IndexSpec::keys().asc("employee_id").unique().sparse(),
        ] {
            target.create_index_definition("users", spec.definition()).unwrap();
        }
        target
    }

    #[tokio::test]
    async fn test_collection_has_id_index() {
        let target = MemoryTarget::new("bbeams_db");
        target.create_collection("devices").await.unwrap();

        let indexes = target.list_indexes("devices").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "_id_");
    }

    #[tokio::test]
    async fn test_create_collection_idempotent() {
        let target = MemoryTarget::new("bbeams_db");
        target.create_collection("devices").await.unwrap();
        target.create_collection("devices").await.unwrap();

        assert_eq!(target.list_collections().await.unwrap(), vec!["devices"]);
        assert_eq!(target.schema_writes(), 1);
    }

    #[tokio::test]
    async fn test_identical_index_is_noop() {
        let target = MemoryTarget::new("bbeams_db");
        let spec = IndexSpec::keys().asc("username").unique();
        target.create_index("users", &spec).await.unwrap();
        let writes = target.schema_writes();

        target.create_index("users", &spec).await.unwrap();
        assert_eq!(target.schema_writes(), writes);
    }

    #[tokio::test]
    async fn test_index_with_different_options_conflicts() {
        let target = MemoryTarget::new("bbeams_db");
        target
            .create_index("users", &IndexSpec::keys().asc("username"))
            .await
            .unwrap();

        let err = target
            .create_index("users", &IndexSpec::keys().asc("username").unique())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BBEAMS_TARGET_INDEX_CONFLICT");
    }

    #[tokio::test]
    async fn test_same_keys_under_other_name_conflicts() {
        let target = MemoryTarget::new("bbeams_db");
        let mut renamed = IndexSpec::keys().asc("email").unique().definition();
        renamed.name = "email_unique".into();
        target.create_index_definition("users", renamed).unwrap();

        let err = target
            .create_index("users", &IndexSpec::keys().asc("email").unique())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("different name: email_unique"));
    }

    #[test]
    fn test_unique_index_build_fails_on_duplicates() {
        let target = MemoryTarget::new("bbeams_db");
        target.insert_one("users", doc! { "username": "alice" }).unwrap();
        target.insert_one("users", doc! { "username": "alice" }).unwrap();

        let err = target
            .create_index_definition("users", IndexSpec::keys().asc("username").unique().definition())
            .unwrap_err();
        assert_eq!(err.code(), "BBEAMS_TARGET_DUPLICATE_KEY");
    }

    #[test]
    fn test_insert_assigns_object_id() {
        let target = MemoryTarget::new("bbeams_db");
        let id = target.insert_one("devices", doc! { "serial": "D-1" }).unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let target = MemoryTarget::new("bbeams_db");
        target.insert_one("devices", doc! { "_id": 7 }).unwrap();
        let err = target.insert_one("devices", doc! { "_id": 7 }).unwrap_err();
        assert_eq!(
            err.to_string(),
            "E11000 duplicate key error collection: bbeams_db.devices index: _id_ dup key: { _id: 7 }"
        );
    }

    #[test]
    fn test_unique_violation_writes_nothing() {
        let target = users();
        target
            .insert_one("users", doc! { "username": "alice", "email": "a@x.io" })
            .unwrap();

        let err = target
            .insert_one("users", doc! { "username": "bob", "email": "a@x.io" })
            .unwrap_err();
        assert!(err.to_string().contains("index: email_1"));
        assert_eq!(target.count_documents("users").unwrap(), 1);
    }

    #[test]
    fn test_sparse_unique_allows_missing_field() {
        let target = users();
        target
            .insert_one("users", doc! { "username": "alice", "email": "a@x.io" })
            .unwrap();
        target
            .insert_one("users", doc! { "username": "bob", "email": "b@x.io" })
            .unwrap();
        assert_eq!(target.count_documents("users").unwrap(), 2);
    }

    #[test]
    fn test_find_uses_compound_index() {
        let target = MemoryTarget::new("bbeams_db");
        target
            .create_index_definition(
                "attendance_records",
                IndexSpec::keys().asc("user_id").desc("timestamp").definition(),
            )
            .unwrap();
        for (user, ms) in [("u1", 1_000), ("u2", 2_000), ("u1", 3_000), ("u1", 2_000)] {
            target
                .insert_one(
                    "attendance_records",
                    doc! { "user_id": user, "timestamp": DateTime::from_millis(ms) },
                )
                .unwrap();
        }

        let result = target
            .find("attendance_records", &doc! { "user_id": "u1" }, &doc! { "timestamp": -1 })
            .unwrap();
        assert_eq!(result.plan.scan_type, ScanType::IndexScan);
        assert!(!result.plan.in_memory_sort);

        let times: Vec<i64> = result
            .documents
            .iter()
            .map(|d| d.get_datetime("timestamp").unwrap().timestamp_millis())
            .collect();
        assert_eq!(times, vec![3_000, 2_000, 1_000]);
    }

    #[test]
    fn test_find_without_index_sorts_in_memory() {
        let target = MemoryTarget::new("bbeams_db");
        for name in ["b", "c", "a"] {
            target.insert_one("policies", doc! { "name": name }).unwrap();
        }

        let result = target.find("policies", &doc! {}, &doc! { "name": 1 }).unwrap();
        assert_eq!(result.plan.scan_type, ScanType::CollectionScan);
        let names: Vec<&str> = result
            .documents
            .iter()
            .map(|d| d.get_str("name").unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sparse_index_skipped_for_null_filter() {
        let target = users();
        target
            .insert_one("users", doc! { "username": "alice", "email": "a@x.io" })
            .unwrap();

        let result = target
            .find("users", &doc! { "employee_id": Bson::Null }, &doc! {})
            .unwrap();
        assert_eq!(result.plan.scan_type, ScanType::CollectionScan);
        assert_eq!(result.documents.len(), 1);

        let explain = target
            .explain("users", &doc! { "employee_id": "E1" }, &doc! {})
            .unwrap();
        assert_eq!(explain.index.as_deref(), Some("employee_id_1"));
    }

    #[test]
    fn test_operator_filter_rejected() {
        let target = MemoryTarget::new("bbeams_db");
        let err = target
            .find("users", &doc! { "age": { "$gt": 3 } }, &doc! {})
            .unwrap_err();
        assert_eq!(err.code(), "BBEAMS_TARGET_INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_unreachable_and_read_only() {
        let target = MemoryTarget::new("bbeams_db");

        target.set_read_only(true);
        let err = target.create_collection("users").await.unwrap_err();
        assert_eq!(err.code(), "BBEAMS_TARGET_PERMISSION_DENIED");
        assert!(target.list_collections().await.unwrap().is_empty());

        target.set_unreachable(true);
        assert!(target.ping().await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_reserved_collection_name_rejected() {
        let target = MemoryTarget::new("bbeams_db");
        let err = target.create_collection("system.users").await.unwrap_err();
        assert_eq!(err.code(), "BBEAMS_TARGET_INVALID_REQUEST");
    }
}
