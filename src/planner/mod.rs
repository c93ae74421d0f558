//! Query planner
//!
//! Answers one question about a declared index set: is a given find served
//! by an index, or does it need a collection scan?
//!
//! # Design Principles
//!
//! - Deterministic: same indexes and query shape, same plan
//! - Read-only: planning never touches documents

mod explain;
mod planner;

pub use explain::ExplainPlan;
pub use planner::{plan_query, QueryPlan, QueryShape, ScanType};
