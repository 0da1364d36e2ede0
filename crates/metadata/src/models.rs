//! Database models mapping to the metadata schema.

use serde_json::Value;
use softdel_core::{EntityRef, Record};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeMap;
use time::OffsetDateTime;

// =============================================================================
// Records
// =============================================================================

/// Row of the `records` table.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub entity_type: String,
    pub id: i64,
    pub deleted: Option<bool>,
    pub archived: Option<bool>,
    pub attributes: Json<BTreeMap<String, Value>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            entity_type: row.entity_type,
            id: row.id,
            deleted: row.deleted,
            archived: row.archived,
            attributes: row.attributes.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Cascade ledger
// =============================================================================

/// Entry of the cascade ledger: a root that has already been booked.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LedgerEntry {
    pub entity_type: String,
    pub entity_id: i64,
    pub in_archive: bool,
    pub created_at: OffsetDateTime,
}

impl LedgerEntry {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.entity_id)
    }
}
