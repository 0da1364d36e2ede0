//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{LedgerRepo, RecordRepo};
use async_trait::async_trait;
use softdel_core::{Catalog, EntitySchema, Record};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: RecordRepo + LedgerRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Catalog the store validates writes against.
    fn catalog(&self) -> &Arc<Catalog>;
}

/// Look up the schema for a record type, failing for uncatalogued types.
pub(crate) fn schema_for<'a>(
    catalog: &'a Catalog,
    entity_type: &str,
) -> MetadataResult<&'a EntitySchema> {
    catalog
        .get(entity_type)
        .ok_or_else(|| MetadataError::NotFound(format!("entity type '{entity_type}'")))
}

/// Shape a record for insertion: status columns follow the schema, then the
/// type's rules must pass.
pub(crate) fn prepare_insert(catalog: &Catalog, record: &Record) -> MetadataResult<Record> {
    let schema = schema_for(catalog, &record.entity_type)?;
    let mut record = record.clone();
    schema.conform(&mut record)?;
    schema.validate(&record).map_err(MetadataError::Validation)?;
    Ok(record)
}

/// Check a record before an update. Status columns the schema does not
/// declare are dropped; a set one is refused.
pub(crate) fn check_save(catalog: &Catalog, record: &mut Record) -> MetadataResult<()> {
    let schema = schema_for(catalog, &record.entity_type)?;
    schema.conform(record)?;
    schema.validate(record).map_err(MetadataError::Validation)
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    catalog: Arc<Catalog>,
}

impl SqliteStore {
    /// Open (creating if missing) a SQLite store and run migrations.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout_secs: u64,
        catalog: Arc<Catalog>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            // A single connection keeps writes serialized and lets `:memory:`
            // databases live as long as the pool.
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool, catalog };
        store.migrate().await?;

        tracing::info!(
            path = %path.display(),
            entity_types = store.catalog.entity_types().count(),
            "SQLite metadata store ready"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::{LedgerEntry, RecordRow};
    use crate::repos::variant_predicate;
    use softdel_core::{RelationSpec, RelationVariant};
    use time::OffsetDateTime;

    #[async_trait]
    impl RecordRepo for SqliteStore {
        async fn find_record(&self, entity_type: &str, id: i64) -> MetadataResult<Option<Record>> {
            let row = sqlx::query_as::<_, RecordRow>(
                "SELECT * FROM records WHERE entity_type = ? AND id = ?",
            )
            .bind(entity_type)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(Record::from))
        }

        async fn insert_record(&self, record: &Record) -> MetadataResult<()> {
            let record = prepare_insert(&self.catalog, record)?;
            if self
                .find_record(&record.entity_type, record.id)
                .await?
                .is_some()
            {
                return Err(MetadataError::AlreadyExists(record.entity_ref().to_string()));
            }

            sqlx::query(
                r#"
                INSERT INTO records (
                    entity_type, id, deleted, archived, attributes, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.entity_type)
            .bind(record.id)
            .bind(record.deleted)
            .bind(record.archived)
            .bind(serde_json::to_string(&record.attributes)?)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn save_record(&self, record: &mut Record) -> MetadataResult<()> {
            check_save(&self.catalog, record)?;

            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                r#"
                UPDATE records
                SET deleted = ?, archived = ?, attributes = ?, updated_at = ?
                WHERE entity_type = ? AND id = ?
                "#,
            )
            .bind(record.deleted)
            .bind(record.archived)
            .bind(serde_json::to_string(&record.attributes)?)
            .bind(now)
            .bind(&record.entity_type)
            .bind(record.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(record.entity_ref().to_string()));
            }
            record.updated_at = now;
            Ok(())
        }

        async fn delete_record(&self, entity_type: &str, id: i64) -> MetadataResult<bool> {
            let result = sqlx::query("DELETE FROM records WHERE entity_type = ? AND id = ?")
                .bind(entity_type)
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn find_related(
            &self,
            parent: &Record,
            relation: &RelationSpec,
            variant: RelationVariant,
        ) -> MetadataResult<Vec<Record>> {
            let sql = format!(
                "SELECT * FROM records WHERE entity_type = ? \
                 AND json_type(attributes, ?) = 'integer' AND json_extract(attributes, ?) = ? \
                 AND {} ORDER BY id",
                variant_predicate(variant)
            );
            let path = format!("$.\"{}\"", relation.foreign_key);
            let rows = sqlx::query_as::<_, RecordRow>(&sql)
                .bind(&relation.target)
                .bind(&path)
                .bind(&path)
                .bind(parent.id)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Record::from).collect())
        }

        async fn list_records(
            &self,
            entity_type: &str,
            variant: RelationVariant,
        ) -> MetadataResult<Vec<Record>> {
            let sql = format!(
                "SELECT * FROM records WHERE entity_type = ? AND {} ORDER BY id",
                variant_predicate(variant)
            );
            let rows = sqlx::query_as::<_, RecordRow>(&sql)
                .bind(entity_type)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Record::from).collect())
        }
    }

    #[async_trait]
    impl LedgerRepo for SqliteStore {
        async fn ledger_contains(&self, entity_type: &str, entity_id: i64) -> MetadataResult<bool> {
            let row: Option<(i32,)> = sqlx::query_as(
                "SELECT 1 FROM cascade_ledger WHERE entity_type = ? AND entity_id = ?",
            )
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.is_some())
        }

        async fn ledger_add(
            &self,
            entity_type: &str,
            entity_id: i64,
            in_archive: bool,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO cascade_ledger (entity_type, entity_id, in_archive, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(entity_type)
            .bind(entity_id)
            .bind(in_archive)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await?;

            let inserted = result.rows_affected() > 0;
            if !inserted {
                tracing::debug!(entity_type, entity_id, "ledger entry already present");
            }
            Ok(inserted)
        }

        async fn get_ledger_entry(
            &self,
            entity_type: &str,
            entity_id: i64,
        ) -> MetadataResult<Option<LedgerEntry>> {
            let row = sqlx::query_as::<_, LedgerEntry>(
                "SELECT * FROM cascade_ledger WHERE entity_type = ? AND entity_id = ?",
            )
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_ledger_entries(&self) -> MetadataResult<Vec<LedgerEntry>> {
            let rows = sqlx::query_as::<_, LedgerEntry>(
                "SELECT * FROM cascade_ledger ORDER BY entity_type, entity_id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Catalogued records. Status columns are NULL for types that do not declare them.
CREATE TABLE IF NOT EXISTS records (
    entity_type TEXT NOT NULL,
    id INTEGER NOT NULL,
    deleted INTEGER,
    archived INTEGER,
    attributes TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, id)
);
CREATE INDEX IF NOT EXISTS idx_records_status ON records(entity_type, deleted, archived);

-- Cascade roots that have already been booked.
CREATE TABLE IF NOT EXISTS cascade_ledger (
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    in_archive INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
);
"#;
