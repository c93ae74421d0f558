//! Schema initializer
//!
//! # Apply sequence (strict order)
//!
//! 1. Validate the manifest
//! 2. Reconcile against the live database (read-only)
//! 3. Abort on any conflict, before the first write
//! 4. Create each missing collection, then its missing indexes
//! 5. Report created and present structures

use std::collections::HashSet;

use chrono::Utc;
use tracing::{error, info, warn};

use super::errors::{InitError, InitResult};
use super::plan::{CollectionAction, CollectionPlan, Conflict, IndexAction, IndexPlan, ProvisionPlan};
use super::reconcile::{classify_index, IndexState};
use super::report::{IndexRef, ProvisionReport};
use crate::manifest::{IndexSpec, Manifest};
use crate::observability::Event;
use crate::target::{SchemaTarget, TargetError};

/// Applies a manifest to a target idempotently
pub struct SchemaInitializer<T> {
    target: T,
}

impl<T: SchemaTarget> SchemaInitializer<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Pings the target
    pub async fn check_connection(&self) -> InitResult<()> {
        self.target.ping().await?;
        info!(
            event = Event::DatabaseConnected.as_str(),
            database = self.target.database_name(),
            "database connected"
        );
        Ok(())
    }

    /// Reconciles the manifest against the target without writing.
    pub async fn plan(&self, manifest: &Manifest) -> InitResult<ProvisionPlan> {
        manifest.validate()?;
        if manifest.database != self.target.database_name() {
            return Err(InitError::DatabaseMismatch {
                manifest: manifest.database.clone(),
                target: self.target.database_name().to_string(),
            });
        }

        let existing: HashSet<String> = self.target.list_collections().await?.into_iter().collect();

        let mut collections = Vec::with_capacity(manifest.collections.len());
        for declared in &manifest.collections {
            let present = existing.contains(&declared.name);
            let live = if present {
                self.target.list_indexes(&declared.name).await?
            } else {
                Vec::new()
            };

            let indexes = declared
                .indexes
                .iter()
                .map(|spec| IndexPlan {
                    name: spec.name(),
                    action: match classify_index(&live, &spec.definition()) {
                        IndexState::Absent => IndexAction::Create,
                        IndexState::Present { name } => IndexAction::Present { existing_name: name },
                        IndexState::Conflict { existing, reason } => {
                            IndexAction::Conflict { existing, reason }
                        }
                    },
                    spec: spec.clone(),
                })
                .collect();

            collections.push(CollectionPlan {
                name: declared.name.clone(),
                action: if present {
                    CollectionAction::Present
                } else {
                    CollectionAction::Create
                },
                indexes,
            });
        }

        let plan = ProvisionPlan {
            database: manifest.database.clone(),
            collections,
        };
        info!(
            event = Event::PlanComputed.as_str(),
            collections_to_create = plan.collections_to_create(),
            indexes_to_create = plan.indexes_to_create(),
            conflicts = plan.conflicts().len(),
            "plan computed"
        );
        Ok(plan)
    }

    /// Brings the target in line with the manifest.
    ///
    /// Returns [`InitError::Drift`] without writing anything when any
    /// existing index conflicts with its declaration.
    pub async fn apply(&self, manifest: &Manifest) -> InitResult<ProvisionReport> {
        info!(
            event = Event::ProvisionBegin.as_str(),
            database = %manifest.database,
            collections = manifest.collections.len(),
            indexes = manifest.index_count(),
            "provisioning begins"
        );

        let result = self.apply_plan(manifest).await;
        match &result {
            Ok(report) => info!(
                event = Event::ProvisionComplete.as_str(),
                collections_created = report.collections_created.len(),
                indexes_created = report.indexes_created.len(),
                "provisioning complete"
            ),
            Err(e) => error!(
                event = Event::ProvisionFailed.as_str(),
                code = e.code(),
                error = %e,
                "provisioning failed"
            ),
        }
        result
    }

    /// Succeeds with the plan only when nothing is missing or conflicting.
    pub async fn verify(&self, manifest: &Manifest) -> InitResult<ProvisionPlan> {
        let plan = self.plan(manifest).await?;

        let conflicts = plan.conflicts();
        if !conflicts.is_empty() {
            report_conflicts(&conflicts);
            return Err(InitError::Drift { conflicts });
        }
        if plan.pending_count() > 0 {
            return Err(InitError::NotConverged {
                pending: plan.pending_count(),
            });
        }
        Ok(plan)
    }

    async fn apply_plan(&self, manifest: &Manifest) -> InitResult<ProvisionReport> {
        let mut report = ProvisionReport::begin(&manifest.database, Utc::now());
        let plan = self.plan(manifest).await?;

        let conflicts = plan.conflicts();
        if !conflicts.is_empty() {
            report_conflicts(&conflicts);
            return Err(InitError::Drift { conflicts });
        }

        for collection in &plan.collections {
            match collection.action {
                CollectionAction::Create => {
                    self.target.create_collection(&collection.name).await?;
                    info!(
                        event = Event::CollectionCreated.as_str(),
                        collection = %collection.name,
                        "collection created"
                    );
                    report.collections_created.push(collection.name.clone());
                }
                CollectionAction::Present => {
                    info!(
                        event = Event::CollectionPresent.as_str(),
                        collection = %collection.name,
                        "collection present"
                    );
                    report.collections_present.push(collection.name.clone());
                }
            }

            for index in &collection.indexes {
                match &index.action {
                    IndexAction::Create => {
                        self.create_index(&collection.name, &index.spec).await?;
                        info!(
                            event = Event::IndexCreated.as_str(),
                            collection = %collection.name,
                            index = %index.name,
                            "index created"
                        );
                        report
                            .indexes_created
                            .push(IndexRef::new(&collection.name, &index.name));
                    }
                    IndexAction::Present { existing_name } => {
                        info!(
                            event = Event::IndexPresent.as_str(),
                            collection = %collection.name,
                            index = %existing_name,
                            "index present"
                        );
                        report
                            .indexes_present
                            .push(IndexRef::new(&collection.name, existing_name));
                    }
                    // rejected before the first write
                    IndexAction::Conflict { .. } => {}
                }
            }
        }

        Ok(report.finish())
    }

    /// Creates one index. A conflict raised by the server means another
    /// writer got there first; it is re-read and reported as drift.
    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> InitResult<()> {
        let err = match self.target.create_index(collection, spec).await {
            Ok(()) => return Ok(()),
            Err(e @ TargetError::IndexConflict { .. }) => e,
            Err(e) => return Err(e.into()),
        };

        let declared = spec.definition();
        let live = self.target.list_indexes(collection).await?;
        match classify_index(&live, &declared) {
            IndexState::Present { .. } => Ok(()),
            IndexState::Conflict { existing, reason } => {
                let conflicts = vec![Conflict {
                    collection: collection.to_string(),
                    declared,
                    existing,
                    reason,
                }];
                report_conflicts(&conflicts);
                Err(InitError::Drift { conflicts })
            }
            IndexState::Absent => Err(err.into()),
        }
    }
}

fn report_conflicts(conflicts: &[Conflict]) {
    for conflict in conflicts {
        warn!(
            event = Event::IndexConflict.as_str(),
            collection = %conflict.collection,
            index = %conflict.declared.name,
            reason = conflict.reason.as_str(),
            existing = %conflict.existing,
            declared = %conflict.declared,
            "existing index conflicts with declaration"
        );
    }
}
