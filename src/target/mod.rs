//! Database targets
//!
//! A target is the database a manifest is applied to. Two implementations:
//!
//! - [`MongoTarget`]: a live deployment, through the official driver
//! - [`MemoryTarget`]: an in-memory document store with the same collection
//!   and index semantics, for dry runs and tests
//!
//! Targets normalize idempotent outcomes: creating an existing collection or
//! an identical index succeeds, and listing indexes of a missing collection
//! returns nothing.

mod errors;
mod memory;
mod mongo;

use async_trait::async_trait;

use crate::manifest::{IndexDefinition, IndexSpec};

pub use errors::{Severity, TargetError, TargetResult};
pub use memory::{FindResult, MemoryTarget};
pub use mongo::MongoTarget;

/// Name of the index the server creates on every collection
pub const ID_INDEX_NAME: &str = "_id_";

/// Schema-level operations against one database
#[async_trait]
pub trait SchemaTarget: Send + Sync {
    /// Name of the selected database
    fn database_name(&self) -> &str;

    /// Verifies the database answers
    async fn ping(&self) -> TargetResult<()>;

    /// Existing collection names, in no particular order
    async fn list_collections(&self) -> TargetResult<Vec<String>>;

    /// Creates a collection; succeeds if it already exists
    async fn create_collection(&self, name: &str) -> TargetResult<()>;

    /// Existing indexes of a collection, including `_id_`
    async fn list_indexes(&self, collection: &str) -> TargetResult<Vec<IndexDefinition>>;

    /// Creates an index under its default name; succeeds if an identical
    /// index exists, fails with [`TargetError::IndexConflict`] if a
    /// different one holds the name or key pattern
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> TargetResult<()>;
}

#[async_trait]
impl<T: SchemaTarget + ?Sized> SchemaTarget for &T {
    fn database_name(&self) -> &str {
        (**self).database_name()
    }

    async fn ping(&self) -> TargetResult<()> {
        (**self).ping().await
    }

    async fn list_collections(&self) -> TargetResult<Vec<String>> {
        (**self).list_collections().await
    }

    async fn create_collection(&self, name: &str) -> TargetResult<()> {
        (**self).create_collection(name).await
    }

    async fn list_indexes(&self, collection: &str) -> TargetResult<Vec<IndexDefinition>> {
        (**self).list_indexes(collection).await
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> TargetResult<()> {
        (**self).create_index(collection, index).await
    }
}
