//! The cascading status-change engine.
//!
//! A cascade walks the active relations of a root record depth-first, flips
//! the status column of every dependent before the record itself, and books
//! the root in the ledger once. When a save fails validation, the records on
//! the current root-to-node trail are set back and the failure is returned.
//!
//! Every step is awaited before the next one starts; branches never run
//! concurrently.

use crate::context::CascadeContext;
use crate::error::{CascadeError, CascadeResult};
use crate::graph::{CatalogGraph, RelationGraph};
use futures::FutureExt;
use futures::future::BoxFuture;
use softdel_core::{Catalog, EntityRef, Record, StatusField, StatusMode, resolve_transition};
use softdel_metadata::{LedgerRepo, MetadataError, MetadataStore, RecordRepo};
use std::sync::Arc;

/// How [`CascadeEngine::delete`] removes a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Mark the record and its active dependents deleted.
    #[default]
    Reversible,
    /// Remove the row. No cascade and no ledger entry.
    Irreversible,
}

/// Orchestrates ledger booking, traversal, status assignment and rollback.
pub struct CascadeEngine {
    catalog: Arc<Catalog>,
    records: Arc<dyn RecordRepo>,
    ledger: Arc<dyn LedgerRepo>,
    graph: Arc<dyn RelationGraph>,
}

impl CascadeEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        records: Arc<dyn RecordRepo>,
        ledger: Arc<dyn LedgerRepo>,
        graph: Arc<dyn RelationGraph>,
    ) -> Self {
        Self {
            catalog,
            records,
            ledger,
            graph,
        }
    }

    /// Engine whose persistence, ledger and relation graph all come from one
    /// metadata store and its catalog.
    pub fn from_store(store: Arc<dyn MetadataStore>) -> Self {
        let records: Arc<dyn RecordRepo> = store.clone();
        let ledger: Arc<dyn LedgerRepo> = store.clone();
        let catalog = store.catalog().clone();
        let graph = Arc::new(CatalogGraph::new(catalog.clone(), records.clone()));
        Self::new(catalog, records, ledger, graph)
    }

    /// Soft-delete `record` and everything reachable through active relations.
    ///
    /// Rejected without side effects when the catalog gives the record's type
    /// no `deleted` column or the record is already deleted.
    pub async fn mark_deleted(&self, record: &mut Record) -> CascadeResult<()> {
        let entity = record.entity_ref();
        self.conform_status(record, StatusField::Deleted)?;
        if record.deleted == Some(true) {
            return Err(CascadeError::AlreadyDeleted(entity));
        }

        tracing::info!(entity = %entity, "starting delete cascade");
        self.transition(
            record,
            StatusMode::Deleting,
            CascadeContext::new(StatusMode::Deleting),
        )
        .await?;
        tracing::info!(entity = %entity, "delete cascade complete");
        Ok(())
    }

    /// Load a record by key and soft-delete it. Returns the updated record.
    pub async fn mark_deleted_by_ref(&self, entity: &EntityRef) -> CascadeResult<Record> {
        let mut record = self.load(entity).await?;
        self.mark_deleted(&mut record).await?;
        Ok(record)
    }

    /// Delete a record either reversibly (cascade) or by removing its row.
    pub async fn delete(&self, record: &mut Record, mode: DeleteMode) -> CascadeResult<()> {
        match mode {
            DeleteMode::Reversible => self.mark_deleted(record).await,
            DeleteMode::Irreversible => {
                let entity = record.entity_ref();
                if !self.records.delete_record(&entity.entity_type, entity.id).await? {
                    return Err(CascadeError::NotFound(entity));
                }
                tracing::info!(entity = %entity, "record removed irreversibly");
                Ok(())
            }
        }
    }

    /// Apply `mode` to `record` and its active dependents.
    pub fn transition<'a>(
        &'a self,
        record: &'a mut Record,
        mode: StatusMode,
        context: CascadeContext,
    ) -> BoxFuture<'a, CascadeResult<()>> {
        async move {
            let transition = resolve_transition(mode)
                .map_err(|_| CascadeError::UnknownTransitionMode(mode.to_string()))?;
            let field = transition.status_field;
            let entity = record.entity_ref();
            self.conform_status(record, field)?;

            let key = context.ledger_key(&entity);
            let forwarded = if self.ledger.ledger_contains(&key.entity_type, key.id).await? {
                context.forward(&entity, None)
            } else {
                self.ledger
                    .ledger_add(&key.entity_type, key.id, transition.in_archive)
                    .await?;
                tracing::debug!(root = %key, in_archive = transition.in_archive, "cascade root booked");
                context.forward(&entity, Some(key))
            };

            for dependents in self.graph.active_relations_of(record).await? {
                for mut dependent in dependents.records {
                    tracing::debug!(
                        parent = %entity,
                        relation = %dependents.relation,
                        dependent = %dependent.entity_ref(),
                        "cascading to dependent"
                    );
                    self.transition(&mut dependent, mode, forwarded.clone())
                        .await?;
                }
            }

            record.set_status(field, true).map_err(|_| {
                CascadeError::RecordNotStatusCapable {
                    entity: entity.clone(),
                    field,
                }
            })?;

            match self.records.save_record(record).await {
                Ok(()) => {
                    tracing::debug!(entity = %entity, field = %field, "status persisted");
                    Ok(())
                }
                Err(MetadataError::Validation(errors)) => {
                    // The flag never reached storage; keep the caller's copy in line.
                    record.reset_status(field);
                    tracing::warn!(
                        entity = %entity,
                        errors = %errors,
                        trail_len = forwarded.trail().len(),
                        "status save failed validation, rolling back trail"
                    );
                    if let Err((failed_at, source)) = self.rollback(&forwarded, field).await {
                        return Err(CascadeError::RollbackFailed {
                            entity,
                            errors,
                            failed_at,
                            source,
                        });
                    }
                    Err(CascadeError::ValidationFailed { entity, errors })
                }
                Err(e) => {
                    record.reset_status(field);
                    Err(e.into())
                }
            }
        }
        .boxed()
    }

    /// Set `field` back to `false` on every record of the trail that storage
    /// still has flagged. Stops at the first failed compensation.
    async fn rollback(
        &self,
        context: &CascadeContext,
        field: StatusField,
    ) -> Result<(), (EntityRef, MetadataError)> {
        for entity in context.trail() {
            let stored = self
                .records
                .find_record(&entity.entity_type, entity.id)
                .await
                .map_err(|e| (entity.clone(), e))?;
            let Some(mut stored) = stored else {
                tracing::warn!(entity = %entity, "rollback target no longer exists, skipping");
                continue;
            };
            if stored.status(field) != Some(true) {
                continue;
            }
            stored.reset_status(field);
            self.records
                .save_record(&mut stored)
                .await
                .map_err(|e| (entity.clone(), e))?;
            tracing::debug!(entity = %entity, field = %field, "status rolled back");
        }
        Ok(())
    }

    /// Capability comes from the catalog, not from the in-memory record. The
    /// record's status columns are then aligned with its schema.
    fn conform_status(&self, record: &mut Record, field: StatusField) -> CascadeResult<()> {
        let schema = self
            .catalog
            .get(&record.entity_type)
            .filter(|schema| schema.has_status(field))
            .ok_or_else(|| CascadeError::RecordNotStatusCapable {
                entity: record.entity_ref(),
                field,
            })?;
        schema
            .conform(record)
            .map_err(|e| CascadeError::from(MetadataError::Core(e)))
    }

    async fn load(&self, entity: &EntityRef) -> CascadeResult<Record> {
        self.records
            .find_record(&entity.entity_type, entity.id)
            .await?
            .ok_or_else(|| CascadeError::NotFound(entity.clone()))
    }
}
