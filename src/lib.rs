//! bbeams-provision - MongoDB schema bootstrap for the attendance platform
//!
//! Ensures `bbeams_db` carries its six collections and eight indexes,
//! idempotently, and reports any existing index that differs from its
//! declaration instead of touching it.

pub mod cli;
pub mod index;
pub mod initializer;
pub mod manifest;
pub mod observability;
pub mod planner;
pub mod target;
