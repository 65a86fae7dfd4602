use crate::backend::{StorageEngine, StorageTransaction};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confdb_core::{ConfigRecord, Result};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS config_records (
    id BIGSERIAL PRIMARY KEY,
    config_type VARCHAR(60) NOT NULL,
    config_id TEXT NOT NULL,
    config_blob JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT config_records_type_id_key UNIQUE (config_type, config_id)
)";

const CREATE_TYPE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS config_records_config_type_idx ON config_records (config_type)";

// "C" collation keeps ordering byte-wise, matching the other engines
const SELECT_COLUMNS: &str = "SELECT config_type, config_id, config_blob, created_at, updated_at
     FROM config_records";
const ORDER_BY: &str = "ORDER BY config_type COLLATE \"C\", config_id COLLATE \"C\"";

/// Storage engine backed by a single PostgreSQL table
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect and make sure the `config_records` table exists
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .context("Failed to create config_records table")?;
        sqlx::query(CREATE_TYPE_INDEX)
            .execute(&self.pool)
            .await
            .context("Failed to create config_records index")?;
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for PgStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn StorageTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

fn record_from_row(r: &PgRow) -> std::result::Result<ConfigRecord, sqlx::Error> {
    Ok(ConfigRecord {
        config_type: r.try_get("config_type")?,
        config_id: r.try_get("config_id")?,
        config_blob: r.try_get("config_blob")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn records_from_rows(rows: &[PgRow]) -> Result<Vec<ConfigRecord>> {
    let records = rows
        .iter()
        .map(record_from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to decode config record")?;
    Ok(records)
}

#[async_trait]
impl StorageTransaction for PgTransaction {
    async fn is_empty(&mut self) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM config_records) AS initialized")
            .fetch_one(&mut *self.tx)
            .await
            .context("Failed to check whether config_records is empty")?;
        let initialized: bool = row
            .try_get("initialized")
            .context("Failed to decode emptiness check")?;
        Ok(!initialized)
    }

    async fn fetch(&mut self, config_type: &str, config_id: &str) -> Result<Vec<ConfigRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE config_type = $1 AND config_id = $2",
            SELECT_COLUMNS
        ))
        .bind(config_type)
        .bind(config_id)
        .fetch_all(&mut *self.tx)
        .await
        .context("Failed to get config")?;

        records_from_rows(&rows)
    }

    async fn scan(&mut self, config_type: Option<&str>) -> Result<Vec<ConfigRecord>> {
        let rows = match config_type {
            Some(config_type) => sqlx::query(&format!(
                "{} WHERE config_type = $1 {}",
                SELECT_COLUMNS, ORDER_BY
            ))
            .bind(config_type)
            .fetch_all(&mut *self.tx)
            .await
            .context("Failed to list configs")?,
            None => sqlx::query(&format!("{} {}", SELECT_COLUMNS, ORDER_BY))
                .fetch_all(&mut *self.tx)
                .await
                .context("Failed to dump configs")?,
        };

        records_from_rows(&rows)
    }

    async fn insert(&mut self, record: ConfigRecord) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO config_records (config_type, config_id, config_blob, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.config_type)
        .bind(&record.config_id)
        .bind(&record.config_blob)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .context("Failed to insert config")?;

        Ok(result.rows_affected())
    }

    async fn update(
        &mut self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE config_records
             SET config_blob = $3, updated_at = GREATEST(updated_at, $4)
             WHERE config_type = $1 AND config_id = $2",
        )
        .bind(config_type)
        .bind(config_id)
        .bind(config_blob)
        .bind(timestamp)
        .execute(&mut *self.tx)
        .await
        .context("Failed to update config")?;

        Ok(result.rows_affected())
    }

    async fn upsert(
        &mut self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO config_records (config_type, config_id, config_blob, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (config_type, config_id) DO UPDATE
             SET config_blob = EXCLUDED.config_blob,
                 updated_at = GREATEST(config_records.updated_at, EXCLUDED.updated_at)",
        )
        .bind(config_type)
        .bind(config_id)
        .bind(config_blob)
        .bind(timestamp)
        .execute(&mut *self.tx)
        .await
        .context("Failed to upsert config")?;

        Ok(())
    }

    async fn delete(&mut self, config_type: &str, config_id: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM config_records WHERE config_type = $1 AND config_id = $2")
                .bind(config_type)
                .bind(config_id)
                .execute(&mut *self.tx)
                .await
                .context("Failed to delete config")?;

        Ok(result.rows_affected())
    }

    async fn truncate(&mut self) -> Result<()> {
        sqlx::query("TRUNCATE TABLE config_records RESTART IDENTITY")
            .execute(&mut *self.tx)
            .await
            .context("Failed to truncate config_records")?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgTransaction { tx } = *self;
        tx.commit()
            .await
            .context("Failed to commit transaction")?;
        Ok(())
    }
}
