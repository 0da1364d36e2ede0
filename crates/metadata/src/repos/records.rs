//! Record persistence repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use softdel_core::{Record, RelationSpec, RelationVariant};

/// Persistence for catalogued records.
///
/// Writes run the catalog's validation rules for the record's type first and
/// fail with [`MetadataError::Validation`](crate::MetadataError::Validation)
/// without touching the database.
#[async_trait]
pub trait RecordRepo: Send + Sync {
    /// Load a record by key.
    async fn find_record(&self, entity_type: &str, id: i64) -> MetadataResult<Option<Record>>;

    /// Insert a new record. Fails with `AlreadyExists` on a duplicate key.
    async fn insert_record(&self, record: &Record) -> MetadataResult<()>;

    /// Persist status flags and attributes of an existing record.
    ///
    /// Refreshes `record.updated_at` on success. Fails with `NotFound` if the
    /// row does not exist.
    async fn save_record(&self, record: &mut Record) -> MetadataResult<()>;

    /// Physically remove a record. Returns whether a row was removed.
    async fn delete_record(&self, entity_type: &str, id: i64) -> MetadataResult<bool>;

    /// Dependents of `parent` through `relation`, filtered by `variant`,
    /// ordered by id.
    async fn find_related(
        &self,
        parent: &Record,
        relation: &RelationSpec,
        variant: RelationVariant,
    ) -> MetadataResult<Vec<Record>>;

    /// All records of a type under `variant`, ordered by id.
    async fn list_records(
        &self,
        entity_type: &str,
        variant: RelationVariant,
    ) -> MetadataResult<Vec<Record>>;
}
