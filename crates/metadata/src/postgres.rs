//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{LedgerEntry, RecordRow};
use crate::repos::{LedgerRepo, RecordRepo, variant_predicate};
use crate::store::{MetadataStore, check_save, prepare_insert};
use async_trait::async_trait;
use softdel_core::config::PgSslMode;
use softdel_core::{Catalog, Record, RelationSpec, RelationVariant};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    catalog: Arc<Catalog>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        catalog: Arc<Catalog>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms, catalog).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        catalog: Arc<Catalog>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms, catalog).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        catalog: Arc<Catalog>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool, catalog };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared statement,
        // so we split the schema and execute each statement separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
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

#[async_trait]
impl RecordRepo for PostgresStore {
    async fn find_record(&self, entity_type: &str, id: i64) -> MetadataResult<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records WHERE entity_type = $1 AND id = $2",
        )
        .bind(entity_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Record::from))
    }

    async fn insert_record(&self, record: &Record) -> MetadataResult<()> {
        let record = prepare_insert(&self.catalog, record)?;
        let result = sqlx::query(
            r#"
            INSERT INTO records (
                entity_type, id, deleted, archived, attributes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (entity_type, id) DO NOTHING
            "#,
        )
        .bind(&record.entity_type)
        .bind(record.id)
        .bind(record.deleted)
        .bind(record.archived)
        .bind(Json(&record.attributes))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::AlreadyExists(record.entity_ref().to_string()));
        }
        Ok(())
    }

    async fn save_record(&self, record: &mut Record) -> MetadataResult<()> {
        check_save(&self.catalog, record)?;

        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            UPDATE records
            SET deleted = $1, archived = $2, attributes = $3, updated_at = $4
            WHERE entity_type = $5 AND id = $6
            "#,
        )
        .bind(record.deleted)
        .bind(record.archived)
        .bind(Json(&record.attributes))
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
        let result = sqlx::query("DELETE FROM records WHERE entity_type = $1 AND id = $2")
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
            "SELECT * FROM records WHERE entity_type = $1 \
             AND jsonb_typeof(attributes -> $2) = 'number' AND attributes ->> $2 = $3 \
             AND {} ORDER BY id",
            variant_predicate(variant)
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(&relation.target)
            .bind(&relation.foreign_key)
            .bind(parent.id.to_string())
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
            "SELECT * FROM records WHERE entity_type = $1 AND {} ORDER BY id",
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
impl LedgerRepo for PostgresStore {
    async fn ledger_contains(&self, entity_type: &str, entity_id: i64) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cascade_ledger WHERE entity_type = $1 AND entity_id = $2)",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn ledger_add(
        &self,
        entity_type: &str,
        entity_id: i64,
        in_archive: bool,
    ) -> MetadataResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO cascade_ledger (entity_type, entity_id, in_archive, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (entity_type, entity_id) DO NOTHING
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
            "SELECT * FROM cascade_ledger WHERE entity_type = $1 AND entity_id = $2",
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
