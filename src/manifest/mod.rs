//! Schema manifest for the attendance platform database
//!
//! The manifest is static data: which collections exist and which indexes
//! they carry. It is fixed at compile time and never read from disk.
//!
//! # Invariants
//!
//! - Collection names are unique
//! - Every index declares at least one key, each field at most once
//! - Index names (server-default naming) are unique per collection

mod errors;
mod manifest;
mod types;

pub use errors::{ManifestError, ManifestResult};
pub use manifest::{collections, validate_collection_name, validate_database_name, Manifest, DEFAULT_DATABASE};
pub use types::{
    default_index_name, CollectionSpec, Direction, IndexDefinition, IndexField, IndexOptions,
    IndexSpec,
};
