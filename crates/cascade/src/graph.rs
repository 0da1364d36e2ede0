//! Relation graph: which dependents a record has right now.

use async_trait::async_trait;
use softdel_core::{Catalog, Record, RelationVariant};
use softdel_metadata::{MetadataResult, RecordRepo};
use std::sync::Arc;

/// Dependents of one record through one named relation.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependents {
    pub relation: String,
    pub records: Vec<Record>,
}

/// Source of a record's dependents.
#[async_trait]
pub trait RelationGraph: Send + Sync {
    /// Every declared relation of `record`, in declaration order, resolved
    /// under `variant`. Relations without dependents yield empty lists.
    async fn relations_of(
        &self,
        record: &Record,
        variant: RelationVariant,
    ) -> MetadataResult<Vec<Dependents>>;

    /// The traversal view: dependents that are neither deleted nor archived.
    async fn active_relations_of(&self, record: &Record) -> MetadataResult<Vec<Dependents>> {
        self.relations_of(record, RelationVariant::Active).await
    }
}

/// Relation graph backed by the static catalog and a record repository.
pub struct CatalogGraph {
    catalog: Arc<Catalog>,
    records: Arc<dyn RecordRepo>,
}

impl CatalogGraph {
    pub fn new(catalog: Arc<Catalog>, records: Arc<dyn RecordRepo>) -> Self {
        Self { catalog, records }
    }
}

#[async_trait]
impl RelationGraph for CatalogGraph {
    async fn relations_of(
        &self,
        record: &Record,
        variant: RelationVariant,
    ) -> MetadataResult<Vec<Dependents>> {
        let relations = self.catalog.relations_of(&record.entity_type);
        let mut resolved = Vec::with_capacity(relations.len());
        for relation in relations {
            let records = self.records.find_related(record, relation, variant).await?;
            resolved.push(Dependents {
                relation: relation.name.clone(),
                records,
            });
        }
        Ok(resolved)
    }
}
