//! In-memory metadata store with save logging and failure injection.

use async_trait::async_trait;
use softdel_core::{Catalog, EntityRef, Record, RelationSpec, RelationVariant, ValidationErrors};
use softdel_metadata::{
    LedgerEntry, LedgerRepo, MetadataError, MetadataResult, MetadataStore, RecordRepo,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// One attempted `save_record` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveEvent {
    pub entity: EntityRef,
    pub deleted: Option<bool>,
    pub accepted: bool,
}

#[derive(Default)]
struct State {
    records: BTreeMap<EntityRef, Record>,
    ledger: BTreeMap<EntityRef, LedgerEntry>,
    saves: Vec<SaveEvent>,
    reject_deletion: HashSet<EntityRef>,
    broken: HashSet<EntityRef>,
}

/// Metadata store held entirely in memory.
pub struct MemoryStore {
    catalog: Arc<Catalog>,
    state: Mutex<State>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new(catalog: Arc<Catalog>) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            state: Mutex::new(State::default()),
        })
    }

    /// Make saves that would mark `entity` deleted fail validation.
    pub fn reject_deletion_of(&self, entity: EntityRef) {
        self.state.lock().unwrap().reject_deletion.insert(entity);
    }

    /// Make every save of `entity` fail with an internal error.
    pub fn break_saves_of(&self, entity: EntityRef) {
        self.state.lock().unwrap().broken.insert(entity);
    }

    /// Stored copy of a record.
    pub fn stored(&self, entity: &EntityRef) -> Option<Record> {
        self.state.lock().unwrap().records.get(entity).cloned()
    }

    /// Stored `deleted` flag, `None` when the record is missing or has no
    /// such column.
    pub fn deleted_flag(&self, entity: &EntityRef) -> Option<bool> {
        self.stored(entity).and_then(|r| r.deleted)
    }

    pub fn saves(&self) -> Vec<SaveEvent> {
        self.state.lock().unwrap().saves.clone()
    }

    /// Entities whose saves were accepted with `deleted = true`, in order.
    pub fn deletion_order(&self) -> Vec<EntityRef> {
        self.saves()
            .into_iter()
            .filter(|e| e.accepted && e.deleted == Some(true))
            .map(|e| e.entity)
            .collect()
    }

    pub fn ledger_keys(&self) -> Vec<EntityRef> {
        self.state.lock().unwrap().ledger.keys().cloned().collect()
    }
}

#[async_trait]
impl RecordRepo for MemoryStore {
    async fn find_record(&self, entity_type: &str, id: i64) -> MetadataResult<Option<Record>> {
        Ok(self.stored(&EntityRef::new(entity_type, id)))
    }

    async fn insert_record(&self, record: &Record) -> MetadataResult<()> {
        let schema = self.catalog.get(&record.entity_type).ok_or_else(|| {
            MetadataError::NotFound(format!("entity type '{}'", record.entity_type))
        })?;
        let mut record = record.clone();
        schema.conform(&mut record)?;
        schema.validate(&record).map_err(MetadataError::Validation)?;

        let mut state = self.state.lock().unwrap();
        let key = record.entity_ref();
        if state.records.contains_key(&key) {
            return Err(MetadataError::AlreadyExists(key.to_string()));
        }
        state.records.insert(key, record);
        Ok(())
    }

    async fn save_record(&self, record: &mut Record) -> MetadataResult<()> {
        let key = record.entity_ref();
        let mut state = self.state.lock().unwrap();

        let outcome = if state.broken.contains(&key) {
            Err(MetadataError::Internal(format!("injected failure saving {key}")))
        } else if let Some(Err(e)) = self
            .catalog
            .get(&record.entity_type)
            .map(|schema| schema.conform(record))
        {
            Err(MetadataError::Core(e))
        } else if record.deleted == Some(true) && state.reject_deletion.contains(&key) {
            let mut errors = ValidationErrors::new();
            errors.add("deleted", format!("{key} cannot be deleted right now."));
            Err(MetadataError::Validation(errors))
        } else {
            self.catalog
                .validate(record)
                .map_err(MetadataError::Validation)
        };

        state.saves.push(SaveEvent {
            entity: key.clone(),
            deleted: record.deleted,
            accepted: outcome.is_ok(),
        });
        outcome?;

        if !state.records.contains_key(&key) {
            return Err(MetadataError::NotFound(key.to_string()));
        }
        record.updated_at = OffsetDateTime::now_utc();
        state.records.insert(key, record.clone());
        Ok(())
    }

    async fn delete_record(&self, entity_type: &str, id: i64) -> MetadataResult<bool> {
        let key = EntityRef::new(entity_type, id);
        Ok(self.state.lock().unwrap().records.remove(&key).is_some())
    }

    async fn find_related(
        &self,
        parent: &Record,
        relation: &RelationSpec,
        variant: RelationVariant,
    ) -> MetadataResult<Vec<Record>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| relation.links(parent, r) && variant.matches_record(r))
            .cloned()
            .collect())
    }

    async fn list_records(
        &self,
        entity_type: &str,
        variant: RelationVariant,
    ) -> MetadataResult<Vec<Record>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| r.entity_type == entity_type && variant.matches_record(r))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerRepo for MemoryStore {
    async fn ledger_contains(&self, entity_type: &str, entity_id: i64) -> MetadataResult<bool> {
        let key = EntityRef::new(entity_type, entity_id);
        Ok(self.state.lock().unwrap().ledger.contains_key(&key))
    }

    async fn ledger_add(
        &self,
        entity_type: &str,
        entity_id: i64,
        in_archive: bool,
    ) -> MetadataResult<bool> {
        let key = EntityRef::new(entity_type, entity_id);
        let mut state = self.state.lock().unwrap();
        if state.ledger.contains_key(&key) {
            return Ok(false);
        }
        state.ledger.insert(
            key,
            LedgerEntry {
                entity_type: entity_type.to_string(),
                entity_id,
                in_archive,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(true)
    }

    async fn get_ledger_entry(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> MetadataResult<Option<LedgerEntry>> {
        let key = EntityRef::new(entity_type, entity_id);
        Ok(self.state.lock().unwrap().ledger.get(&key).cloned())
    }

    async fn list_ledger_entries(&self) -> MetadataResult<Vec<LedgerEntry>> {
        Ok(self.state.lock().unwrap().ledger.values().cloned().collect())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn migrate(&self) -> MetadataResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }

    fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}
