use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confdb_core::{ConfigRecord, Result};
use serde_json::Value;

/// A transactional key-row store keyed by (config_type, config_id).
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Short engine name used in logs
    fn name(&self) -> &'static str;

    /// Open a transaction. Nothing it does is visible to other transactions
    /// until [`StorageTransaction::commit`]; dropping it rolls back.
    async fn begin(&self) -> Result<Box<dyn StorageTransaction>>;
}

/// Operations available inside one storage transaction.
///
/// Engines must never let a row's `updated_at` decrease: `update` and
/// `upsert` keep the later of the stored and supplied timestamps.
#[async_trait]
pub trait StorageTransaction: Send {
    /// True if the table holds no rows at all
    async fn is_empty(&mut self) -> Result<bool>;

    /// Every row matching the key. More than one means the uniqueness
    /// invariant is broken; the caller decides how loudly to fail.
    async fn fetch(&mut self, config_type: &str, config_id: &str) -> Result<Vec<ConfigRecord>>;

    /// Rows of one type, or of every type, ordered by (config_type, config_id)
    async fn scan(&mut self, config_type: Option<&str>) -> Result<Vec<ConfigRecord>>;

    async fn insert(&mut self, record: ConfigRecord) -> Result<u64>;

    /// Replace the blob of an existing row, returning the affected row count
    async fn update(
        &mut self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<u64>;

    /// Atomic insert-or-replace. A new row gets `created_at = updated_at =
    /// timestamp`; an existing row keeps its `created_at`.
    async fn upsert(
        &mut self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    async fn delete(&mut self, config_type: &str, config_id: &str) -> Result<u64>;

    async fn truncate(&mut self) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
