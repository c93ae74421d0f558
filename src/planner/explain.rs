//! Explain output
//!
//! Produces deterministic, human-readable explain output.

use std::fmt;

use serde::Serialize;

use super::planner::QueryPlan;

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainPlan {
    /// Collection queried
    pub collection: String,
    /// `IXSCAN` or `COLLSCAN`
    pub stage: String,
    /// Selected index (index scans only)
    pub index: Option<String>,
    /// `forward` or `backward` (index scans only)
    pub direction: Option<String>,
    /// Equality fields bound by the index
    pub index_bounds: Vec<String>,
    /// Equality fields checked per document
    pub filter: Vec<String>,
    /// Requested sort
    pub sort: Vec<String>,
    /// Whether a blocking in-memory sort is needed
    pub in_memory_sort: bool,
}

impl ExplainPlan {
    /// Creates an explain plan from a query plan
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let index_bounds = plan
            .index
            .as_ref()
            .map(|i| {
                i.keys[..plan.prefix_len]
                    .iter()
                    .map(|k| k.field.clone())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            collection: plan.collection.clone(),
            stage: plan.scan_type.as_str().to_string(),
            index: plan.index_name().map(str::to_string),
            direction: plan.index.as_ref().map(|_| {
                if plan.reverse { "backward" } else { "forward" }.to_string()
            }),
            index_bounds,
            filter: plan.residual_filter.clone(),
            sort: plan
                .sort
                .iter()
                .map(|s| format!("{} {}", s.field, s.direction))
                .collect(),
            in_memory_sort: plan.in_memory_sort,
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Collection: {}", self.collection)?;
        writeln!(f, "Stage: {}", self.stage)?;
        if let Some(index) = &self.index {
            writeln!(f, "Index: {}", index)?;
        }
        if let Some(direction) = &self.direction {
            writeln!(f, "Direction: {}", direction)?;
        }
        if !self.index_bounds.is_empty() {
            writeln!(f, "Index Bounds: {}", self.index_bounds.join(", "))?;
        }
        if !self.filter.is_empty() {
            writeln!(f, "Filter: {}", self.filter.join(", "))?;
        }
        if !self.sort.is_empty() {
            let source = if self.in_memory_sort { "in memory" } else { "from index" };
            writeln!(f, "Sort: {} ({})", self.sort.join(", "), source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::IndexSpec;
    use crate::planner::{plan_query, QueryShape};

    #[test]
    fn test_index_scan_explain() {
        let indexes = vec![IndexSpec::keys().asc("user_id").desc("timestamp").definition()];
        let shape = QueryShape::new("attendance_records")
            .equals("user_id")
            .sort_desc("timestamp");
        let explain = ExplainPlan::from_plan(&plan_query(&indexes, &shape));

        assert_eq!(
            explain.to_string(),
            "=== EXPLAIN PLAN ===\n\
             Collection: attendance_records\n\
             Stage: IXSCAN\n\
             Index: user_id_1_timestamp_-1\n\
             Direction: forward\n\
             Index Bounds: user_id\n\
             Sort: timestamp -1 (from index)\n"
        );
    }

    #[test]
    fn test_collection_scan_explain() {
        let shape = QueryShape::new("policies").equals("name").sort_asc("name");
        let explain = ExplainPlan::from_plan(&plan_query(&[], &shape));

        assert_eq!(explain.stage, "COLLSCAN");
        assert!(explain.index.is_none());
        assert!(explain.direction.is_none());
        assert!(explain.to_string().contains("Sort: name 1 (in memory)"));
    }
}
