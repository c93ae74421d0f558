//! Query planner
//!
//! Decides whether a find (equality predicates plus a sort) can be served by
//! one of a collection's indexes.
//!
//! An index is eligible when its leading keys are equality fields (the
//! equality prefix), or when the sort starts at its first key. The sort is
//! served by the index when the sort fields continue the equality prefix with
//! directions either all matching or all reversed. Sort fields that are also
//! equality fields hold one value per result and are ignored.
//!
//! Ranking among eligible indexes (strict order):
//! 1. Serves the requested sort
//! 2. Longer equality prefix
//! 3. Fewer keys
//! 4. Name, lexicographically

use std::collections::HashSet;

use crate::manifest::{IndexDefinition, IndexField};

/// Shape of a find: which fields are matched by equality, and the sort order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryShape {
    /// Collection queried
    pub collection: String,
    /// Fields constrained by equality
    pub equality: Vec<String>,
    /// Requested sort, in priority order
    pub sort: Vec<IndexField>,
}

impl QueryShape {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn equals(mut self, field: impl Into<String>) -> Self {
        self.equality.push(field.into());
        self
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(IndexField::asc(field));
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(IndexField::desc(field));
        self
    }
}

/// Stage type used by a query plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// Ordered walk over an index
    IndexScan,
    /// Every document examined
    CollectionScan,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::IndexScan => "IXSCAN",
            ScanType::CollectionScan => "COLLSCAN",
        }
    }
}

/// Immutable query plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Collection to query
    pub collection: String,
    /// Scan type
    pub scan_type: ScanType,
    /// Chosen index, for index scans
    pub index: Option<IndexDefinition>,
    /// Number of leading index keys bound by equality
    pub prefix_len: usize,
    /// Whether the index is walked backwards
    pub reverse: bool,
    /// Equality fields not bound by the index prefix
    pub residual_filter: Vec<String>,
    /// Requested sort
    pub sort: Vec<IndexField>,
    /// Whether documents must be sorted after the scan
    pub in_memory_sort: bool,
}

impl QueryPlan {
    /// Whether the plan avoids a collection scan
    pub fn is_index_scan(&self) -> bool {
        self.scan_type == ScanType::IndexScan
    }

    /// Name of the chosen index, for index scans
    pub fn index_name(&self) -> Option<&str> {
        self.index.as_ref().map(|i| i.name.as_str())
    }
}

struct Candidate<'a> {
    index: &'a IndexDefinition,
    prefix_len: usize,
    sort_served: Option<bool>,
}

impl Candidate<'_> {
    /// Smaller is better
    fn rank(&self, wants_sort: bool) -> (bool, usize, usize, &str) {
        (
            wants_sort && self.sort_served.is_none(),
            usize::MAX - self.prefix_len,
            self.index.keys.len(),
            self.index.name.as_str(),
        )
    }
}

/// Plans a query against a set of index definitions.
///
/// This function is deterministic: same inputs, same plan.
pub fn plan_query(indexes: &[IndexDefinition], shape: &QueryShape) -> QueryPlan {
    let equality: HashSet<&str> = shape.equality.iter().map(String::as_str).collect();
    let sort: Vec<IndexField> = shape
        .sort
        .iter()
        .filter(|s| !equality.contains(s.field.as_str()))
        .cloned()
        .collect();
    let wants_sort = !sort.is_empty();

    let best = indexes
        .iter()
        .filter(|index| index.keys.iter().all(|k| k.direction.is_ordered()))
        .filter_map(|index| {
            let prefix_len = index
                .keys
                .iter()
                .take_while(|k| equality.contains(k.field.as_str()))
                .count();
            let sort_served = sort_direction(&index.keys[prefix_len..], &sort);

            if prefix_len == 0 && !(wants_sort && sort_served.is_some()) {
                return None;
            }
            Some(Candidate {
                index,
                prefix_len,
                sort_served,
            })
        })
        .min_by(|a, b| a.rank(wants_sort).cmp(&b.rank(wants_sort)));

    match best {
        Some(candidate) => {
            let bound: HashSet<&str> = candidate.index.keys[..candidate.prefix_len]
                .iter()
                .map(|k| k.field.as_str())
                .collect();

            QueryPlan {
                collection: shape.collection.clone(),
                scan_type: ScanType::IndexScan,
                index: Some(candidate.index.clone()),
                prefix_len: candidate.prefix_len,
                reverse: candidate.sort_served.unwrap_or(false),
                residual_filter: residual(&shape.equality, &bound),
                sort: shape.sort.clone(),
                in_memory_sort: wants_sort && candidate.sort_served.is_none(),
            }
        }
        None => QueryPlan {
            collection: shape.collection.clone(),
            scan_type: ScanType::CollectionScan,
            index: None,
            prefix_len: 0,
            reverse: false,
            residual_filter: residual(&shape.equality, &HashSet::new()),
            sort: shape.sort.clone(),
            in_memory_sort: wants_sort,
        },
    }
}

/// `Some(reverse)` when `keys` starts with the sort fields in uniformly
/// matching (`false`) or uniformly reversed (`true`) directions.
fn sort_direction(keys: &[IndexField], sort: &[IndexField]) -> Option<bool> {
    if sort.is_empty() {
        return Some(false);
    }
    if sort.len() > keys.len() {
        return None;
    }

    let mut reverse = None;
    for (key, wanted) in keys.iter().zip(sort) {
        if key.field != wanted.field {
            return None;
        }
        let flipped = key.direction != wanted.direction;
        match reverse {
            None => reverse = Some(flipped),
            Some(r) if r != flipped => return None,
            Some(_) => {}
        }
    }
    reverse
}

fn residual(equality: &[String], bound: &HashSet<&str>) -> Vec<String> {
    let mut fields: Vec<String> = equality
        .iter()
        .filter(|f| !bound.contains(f.as_str()))
        .cloned()
        .collect();
    fields.sort();
    fields.dedup();
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{IndexSpec, Manifest};

    fn attendance_indexes() -> Vec<IndexDefinition> {
        Manifest::bbeams()
            .get("attendance_records")
            .unwrap()
            .indexes
            .iter()
            .map(IndexSpec::definition)
            .collect()
    }

    #[test]
    fn test_equality_and_sort_served_by_compound_index() {
        let shape = QueryShape::new("attendance_records")
            .equals("user_id")
            .sort_desc("timestamp");

        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.scan_type, ScanType::IndexScan);
        assert_eq!(plan.index_name(), Some("user_id_1_timestamp_-1"));
        assert!(!plan.reverse);
        assert!(!plan.in_memory_sort);
        assert_eq!(plan.prefix_len, 1);
    }

    #[test]
    fn test_ascending_sort_walks_backwards() {
        let shape = QueryShape::new("attendance_records")
            .equals("device_id")
            .sort_asc("timestamp");

        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.index_name(), Some("device_id_1_timestamp_-1"));
        assert!(plan.reverse);
        assert!(!plan.in_memory_sort);
    }

    #[test]
    fn test_unindexed_filter_is_collection_scan() {
        let shape = QueryShape::new("attendance_records")
            .equals("status")
            .sort_desc("timestamp");

        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.scan_type, ScanType::CollectionScan);
        assert!(plan.in_memory_sort);
        assert_eq!(plan.residual_filter, vec!["status".to_string()]);
    }

    #[test]
    fn test_sort_on_non_leading_key_not_served() {
        let shape = QueryShape::new("attendance_records").sort_desc("timestamp");
        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.scan_type, ScanType::CollectionScan);
    }

    #[test]
    fn test_prefix_with_residual_filter() {
        let shape = QueryShape::new("attendance_records")
            .equals("user_id")
            .equals("status");

        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.index_name(), Some("user_id_1_timestamp_-1"));
        assert_eq!(plan.residual_filter, vec!["status".to_string()]);
    }

    #[test]
    fn test_index_serving_sort_preferred() {
        let indexes = vec![
            IndexSpec::keys().asc("user_id").definition(),
            IndexSpec::keys().asc("user_id").asc("status").definition(),
        ];
        let shape = QueryShape::new("leave_requests").equals("user_id").sort_asc("status");

        let plan = plan_query(&indexes, &shape);
        assert_eq!(plan.index_name(), Some("user_id_1_status_1"));
        assert!(!plan.in_memory_sort);
    }

    #[test]
    fn test_index_without_sort_gets_in_memory_sort() {
        let indexes = vec![IndexSpec::keys().asc("user_id").asc("status").definition()];
        let shape = QueryShape::new("leave_requests").equals("user_id").sort_desc("start_date");

        let plan = plan_query(&indexes, &shape);
        assert!(plan.is_index_scan());
        assert!(plan.in_memory_sort);
    }

    #[test]
    fn test_mixed_directions_not_served() {
        let indexes = vec![IndexSpec::keys().asc("start_date").asc("end_date").definition()];
        let shape = QueryShape::new("leave_requests")
            .sort_asc("start_date")
            .sort_desc("end_date");

        let plan = plan_query(&indexes, &shape);
        assert_eq!(plan.scan_type, ScanType::CollectionScan);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let shape = QueryShape::new("attendance_records")
            .equals("user_id")
            .sort_desc("timestamp");
        let first = plan_query(&attendance_indexes(), &shape);
        for _ in 0..50 {
            assert_eq!(plan_query(&attendance_indexes(), &shape), first);
        }
    }

    #[test]
    fn test_sort_repeating_equality_field_served() {
        let shape = QueryShape::new("attendance_records")
            .equals("user_id")
            .sort_asc("user_id")
            .sort_desc("timestamp");

        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.index_name(), Some("user_id_1_timestamp_-1"));
        assert!(!plan.reverse);
        assert!(!plan.in_memory_sort);
        assert_eq!(plan.sort.len(), 2);
    }

    #[test]
    fn test_sort_only_on_equality_field_needs_no_sort() {
        let shape = QueryShape::new("attendance_records")
            .equals("device_id")
            .sort_desc("device_id");

        let plan = plan_query(&attendance_indexes(), &shape);
        assert_eq!(plan.index_name(), Some("device_id_1_timestamp_-1"));
        assert!(!plan.in_memory_sort);
    }

    #[test]
    fn test_empty_query_is_collection_scan() {
        let plan = plan_query(&attendance_indexes(), &QueryShape::new("attendance_records"));
        assert_eq!(plan.scan_type, ScanType::CollectionScan);
        assert!(!plan.in_memory_sort);
    }
}
