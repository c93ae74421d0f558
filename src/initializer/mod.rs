//! Schema initializer subsystem
//!
//! Ensures the collections and indexes a manifest declares exist on a
//! target, and nothing else.
//!
//! # Invariants
//!
//! - Only schema metadata is written; no document is touched
//! - Nothing is ever dropped, renamed, or modified
//! - A conflicting index aborts the run before the first write
//! - Re-running against a converged database writes nothing

mod errors;
mod initializer;
mod plan;
mod reconcile;
mod report;

pub use errors::{InitError, InitResult};
pub use initializer::SchemaInitializer;
pub use plan::{CollectionAction, CollectionPlan, Conflict, IndexAction, IndexPlan, ProvisionPlan};
pub use reconcile::{classify_index, ConflictReason, IndexState};
pub use report::{IndexRef, ProvisionReport};
