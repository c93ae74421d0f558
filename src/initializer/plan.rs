//! Provisioning plan
//!
//! The read-only outcome of reconciling a manifest against a live database.

use std::fmt;

use serde::Serialize;

use super::reconcile::ConflictReason;
use crate::manifest::{IndexDefinition, IndexSpec};

/// What happens to a declared collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionAction {
    Create,
    Present,
}

/// What happens to a declared index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IndexAction {
    Create,
    Present {
        existing_name: String,
    },
    Conflict {
        existing: IndexDefinition,
        reason: ConflictReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexPlan {
    pub name: String,
    #[serde(flatten)]
    pub spec: IndexSpec,
    #[serde(flatten)]
    pub action: IndexAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionPlan {
    pub name: String,
    pub action: CollectionAction,
    pub indexes: Vec<IndexPlan>,
}

/// An existing index that differs from its declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub collection: String,
    pub declared: IndexDefinition,
    pub existing: IndexDefinition,
    pub reason: ConflictReason,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {} (existing: {}; declared: {})",
            self.collection, self.declared.name, self.reason, self.existing, self.declared
        )
    }
}

/// Per-collection, per-index actions for one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionPlan {
    pub database: String,
    pub collections: Vec<CollectionPlan>,
}

impl ProvisionPlan {
    /// Every conflicting index, in manifest order
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.collections
            .iter()
            .flat_map(|c| {
                c.indexes.iter().filter_map(move |i| match &i.action {
                    IndexAction::Conflict { existing, reason } => Some(Conflict {
                        collection: c.name.clone(),
                        declared: i.spec.definition(),
                        existing: existing.clone(),
                        reason: *reason,
                    }),
                    _ => None,
                })
            })
            .collect()
    }

    pub fn collections_to_create(&self) -> usize {
        self.collections
            .iter()
            .filter(|c| c.action == CollectionAction::Create)
            .count()
    }

    pub fn indexes_to_create(&self) -> usize {
        self.collections
            .iter()
            .flat_map(|c| &c.indexes)
            .filter(|i| i.action == IndexAction::Create)
            .count()
    }

    /// Structures an apply would create
    pub fn pending_count(&self) -> usize {
        self.collections_to_create() + self.indexes_to_create()
    }

    /// Nothing to create and nothing conflicting
    pub fn is_converged(&self) -> bool {
        self.pending_count() == 0 && self.conflicts().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> ProvisionPlan {
        let username = IndexSpec::keys().asc("username").unique();
        ProvisionPlan {
            database: "bbeams_db".into(),
            collections: vec![
                CollectionPlan {
                    name: "users".into(),
                    action: CollectionAction::Present,
                    indexes: vec![
                        IndexPlan {
                            name: username.name(),
                            action: IndexAction::Conflict {
                                existing: IndexSpec::keys().asc("username").definition(),
                                reason: ConflictReason::OptionsDiffer,
                            },
                            spec: username,
                        },
                        IndexPlan {
                            name: "email_1".into(),
                            spec: IndexSpec::keys().asc("email").unique(),
                            action: IndexAction::Create,
                        },
                    ],
                },
                CollectionPlan {
                    name: "devices".into(),
                    action: CollectionAction::Create,
                    indexes: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_counts() {
        let plan = plan();
        assert_eq!(plan.collections_to_create(), 1);
        assert_eq!(plan.indexes_to_create(), 1);
        assert_eq!(plan.pending_count(), 2);
        assert!(!plan.is_converged());
    }

    #[test]
    fn test_conflicts_listed() {
        let conflicts = plan().conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].collection, "users");
        assert_eq!(
            conflicts[0].to_string(),
            "users.username_1: options differ (existing: username_1 { username: 1 }; \
             declared: username_1 { username: 1 } unique)"
        );
    }

    #[test]
    fn test_plan_json_shape() {
        let json = serde_json::to_value(plan()).unwrap();
        let username = &json["collections"][0]["indexes"][0];
        assert_eq!(username["name"], "username_1");
        assert_eq!(username["action"], "conflict");
        assert_eq!(username["reason"], "options_differ");
        assert_eq!(username["options"]["unique"], true);
        assert_eq!(json["collections"][1]["action"], "create");
    }
}
