//! Cascade ledger repository trait.

use crate::error::MetadataResult;
use crate::models::LedgerEntry;
use async_trait::async_trait;

/// Durable set of cascade roots that have already been booked.
///
/// Entries are never removed; the table doubles as an audit trail.
#[async_trait]
pub trait LedgerRepo: Send + Sync {
    /// Check whether `(entity_type, entity_id)` has an entry.
    async fn ledger_contains(&self, entity_type: &str, entity_id: i64) -> MetadataResult<bool>;

    /// Book an entry. A duplicate is ignored; returns whether a row was added.
    async fn ledger_add(
        &self,
        entity_type: &str,
        entity_id: i64,
        in_archive: bool,
    ) -> MetadataResult<bool>;

    /// Get a single entry.
    async fn get_ledger_entry(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> MetadataResult<Option<LedgerEntry>>;

    /// All entries ordered by `(entity_type, entity_id)`.
    async fn list_ledger_entries(&self) -> MetadataResult<Vec<LedgerEntry>>;
}
