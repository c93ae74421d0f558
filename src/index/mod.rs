//! In-memory index structures
//!
//! Backs the in-memory target: unique and sparse enforcement, and ordered
//! scans for index-served queries.
//!
//! # Invariants
//!
//! - Entries ordered by BSON type order, then value; descending parts reversed
//! - A unique index never holds two documents under one key
//! - A sparse index holds no entry for a document lacking every indexed field
//! - A non-sparse index stores a missing field as null

mod btree;
mod errors;

pub use btree::{lookup_path, DocId, EntryKey, IndexKey, IndexTree, KeyPart, Number};
pub use errors::{IndexError, IndexResult};
