use crate::backend::{StorageEngine, StorageTransaction};
use crate::validating::{CatalogValidator, ValidatingConfigStore};
use crate::FileStorage;
use chrono::{DateTime, Utc};
use confdb_core::{ConfigDocument, ConfigRecord, ConfigTypeCatalog, Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Span};

/// Typed CRUD and bulk export/import of configuration documents.
///
/// Every operation runs inside a single storage transaction, so a failure
/// part way through leaves the previously committed state untouched.
#[derive(Clone)]
pub struct ConfigStore {
    engine: Arc<dyn StorageEngine>,
    catalog: Arc<ConfigTypeCatalog>,
    span: Span,
}

impl ConfigStore {
    pub fn new(engine: Arc<dyn StorageEngine>, catalog: Arc<ConfigTypeCatalog>) -> Self {
        let span = info_span!("config_store", engine = engine.name());
        Self {
            engine,
            catalog,
            span,
        }
    }

    /// Volatile store over the standard catalogue
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(FileStorage::in_memory()),
            Arc::new(ConfigTypeCatalog::standard()),
        )
    }

    /// Log under `span` instead of the default `config_store` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Wrap this store so every blob is checked against the catalogue
    pub fn with_validation(self) -> ValidatingConfigStore {
        let validator = Arc::new(CatalogValidator::new(self.catalog.clone()));
        ValidatingConfigStore::new(self, validator)
    }

    pub fn catalog(&self) -> &Arc<ConfigTypeCatalog> {
        &self.catalog
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) async fn begin(&self) -> Result<Box<dyn StorageTransaction>> {
        self.engine.begin().await
    }

    // ========== Single records ==========

    /// Full row for (config_type, config_id), timestamps included
    pub async fn get_record(&self, config_type: &str, config_id: &str) -> Result<ConfigRecord> {
        let mut tx = self.begin().await?;
        let mut records = tx.fetch(config_type, config_id).await?;

        match records.len() {
            0 => Err(Error::not_found(config_type, config_id)),
            1 => Ok(records.remove(0)),
            n => {
                error!(
                    parent: &self.span,
                    "Multiple {} configs found for ID {}: {} rows", config_type, config_id, n
                );
                Err(Error::InvariantViolation(format!(
                    "Multiple {} configs found for ID {}: {} rows",
                    config_type, config_id, n
                )))
            }
        }
    }

    pub async fn get_config(&self, config_type: &str, config_id: &str) -> Result<Value> {
        Ok(self.get_record(config_type, config_id).await?.config_blob)
    }

    pub async fn get_typed<T: ConfigDocument>(&self, config_id: &str) -> Result<T> {
        let blob = self.get_config(T::CONFIG_TYPE.name(), config_id).await?;
        decode_typed(blob)
    }

    /// Insert or replace one document in a single atomic upsert
    pub async fn write_config(
        &self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
    ) -> Result<()> {
        info!(parent: &self.span, "Upserting {} record {}", config_type, config_id);

        let mut tx = self.begin().await?;
        tx.upsert(config_type, config_id, config_blob, Utc::now())
            .await?;
        tx.commit().await
    }

    pub async fn write_typed<T: ConfigDocument>(&self, config_id: &str, config: &T) -> Result<()> {
        let blob = serde_json::to_value(config)?;
        self.write_config(T::CONFIG_TYPE.name(), config_id, &blob)
            .await
    }

    /// Remove a document; absent documents are not an error
    pub async fn delete_config(&self, config_type: &str, config_id: &str) -> Result<()> {
        let mut tx = self.begin().await?;
        let deleted = tx.delete(config_type, config_id).await?;
        tx.commit().await?;

        match deleted {
            0 => debug!(parent: &self.span, "No {} record {} to delete", config_type, config_id),
            1 => info!(parent: &self.span, "Deleted {} record {}", config_type, config_id),
            n => warn!(
                parent: &self.span,
                "{} config {} has been deleted; deleted record count: {}", config_type, config_id, n
            ),
        }
        Ok(())
    }

    // ========== Listing ==========

    /// Every document of one type, ordered by id
    pub async fn list_configs(&self, config_type: &str) -> Result<Vec<Value>> {
        let mut tx = self.begin().await?;
        let records = tx.scan(Some(config_type)).await?;
        Ok(records.into_iter().map(|r| r.config_blob).collect())
    }

    pub async fn list_typed<T: ConfigDocument>(&self) -> Result<Vec<T>> {
        self.list_configs(T::CONFIG_TYPE.name())
            .await?
            .into_iter()
            .map(decode_typed)
            .collect()
    }

    pub async fn is_empty(&self) -> Result<bool> {
        let mut tx = self.begin().await?;
        tx.is_empty().await
    }

    // ========== Bulk export / import ==========

    /// Export every document grouped by type, each group ordered by id
    pub async fn dump_configs(&self) -> Result<BTreeMap<String, Vec<Value>>> {
        info!(parent: &self.span, "Exporting all configs...");

        let mut tx = self.begin().await?;
        let mut dump: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for record in tx.scan(None).await? {
            dump.entry(record.config_type)
                .or_default()
                .push(record.config_blob);
        }
        Ok(dump)
    }

    /// Clear the store and load `configs` in its place.
    ///
    /// Ids come from each type's declared id field, or are generated when the
    /// type has none. With `dry_run` nothing is touched and the number of
    /// records that would be inserted is returned.
    pub async fn replace_all_configs<T: Serialize>(
        &self,
        configs: &BTreeMap<String, Vec<T>>,
        dry_run: bool,
    ) -> Result<usize> {
        let mut prepared = Vec::new();
        for (config_type, objects) in configs {
            for object in objects {
                let blob = serde_json::to_value(object)?;
                let config_id = self.catalog.derive_config_id(config_type, &blob)?;
                prepared.push((config_type.as_str(), config_id, blob));
            }
        }

        if dry_run {
            info!(
                parent: &self.span,
                "Dry run: {} records would replace the current configs",
                prepared.len()
            );
            return Ok(prepared.len());
        }

        info!(parent: &self.span, "Replacing all configs");

        let timestamp = Utc::now();
        let mut tx = self.begin().await?;
        tx.truncate().await?;

        let mut insertion_count = 0;
        for (config_type, config_id, blob) in prepared {
            insertion_count += insert_config_record(
                tx.as_mut(),
                &self.span,
                timestamp,
                config_type,
                &config_id,
                blob,
            )
            .await?;
        }
        tx.commit().await?;

        info!(
            parent: &self.span,
            "Config database is reset with {} records", insertion_count
        );
        Ok(insertion_count)
    }
}

fn decode_typed<T: ConfigDocument>(blob: Value) -> Result<T> {
    serde_json::from_value(blob).map_err(|e| {
        Error::Validation(format!("Invalid {} document: {}", T::CONFIG_TYPE, e))
    })
}

/// Insert one fresh row, returning the number of rows written (always 1 on success)
pub(crate) async fn insert_config_record(
    tx: &mut dyn StorageTransaction,
    span: &Span,
    timestamp: DateTime<Utc>,
    config_type: &str,
    config_id: &str,
    config_blob: Value,
) -> Result<usize> {
    info!(parent: span, "Inserting {} record {}", config_type, config_id);

    let inserted = tx
        .insert(ConfigRecord::new(
            config_type,
            config_id,
            config_blob,
            timestamp,
        ))
        .await?;
    if inserted != 1 {
        warn!(
            parent: span,
            "{} config {} has been inserted; insertion record count: {}",
            config_type,
            config_id,
            inserted
        );
    }
    Ok(inserted as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use confdb_core::{ConfigType, StandardSourceDefinition};
    use serde_json::json;
    use std::time::Duration;

    const T: &str = "STANDARD_SYNC_OUTPUT";

    #[tokio::test]
    async fn write_then_get_returns_an_equal_document() {
        let store = ConfigStore::in_memory();
        let blob = json!({
            "nested": {"deeper": {"list": [1, 2, {"three": 3}]}},
            "unicode": "héllo wörld ✓ 日本語",
            "float": 3.141592653589793,
            "big": 9007199254740993u64,
            "negative": -42,
            "nothing": null,
            "flag": true
        });

        store.write_config(T, "doc", &blob).await.unwrap();

        assert_eq!(store.get_config(T, "doc").await.unwrap(), blob);
    }

    #[tokio::test]
    async fn list_orders_by_id() {
        let store = ConfigStore::in_memory();
        for id in ["b", "a", "c"] {
            store.write_config(T, id, &json!({ "id": id })).await.unwrap();
        }

        let ids: Vec<Value> = store
            .list_configs(T)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("b"), json!("c")]);

        assert!(store.list_configs("NOTHING_HERE").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_config_is_not_found() {
        let store = ConfigStore::in_memory();

        let err = store.get_config(T, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upsert_preserves_created_at_and_advances_updated_at() {
        let store = ConfigStore::in_memory();

        store.write_config(T, "a", &json!({"v": 1})).await.unwrap();
        let first = store.get_record(T, "a").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.write_config(T, "a", &json!({"v": 2})).await.unwrap();
        let second = store.get_record(T, "a").await.unwrap();

        assert_eq!(second.config_blob, json!({"v": 2}));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = ConfigStore::in_memory();
        store.write_config(T, "a", &json!({})).await.unwrap();

        store.delete_config(T, "missing").await.unwrap();
        store.delete_config(T, "missing").await.unwrap();

        store.delete_config(T, "a").await.unwrap();
        store.delete_config(T, "a").await.unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn dump_groups_by_type() {
        let store = ConfigStore::in_memory();
        store.write_config("B", "2", &json!({"n": 2})).await.unwrap();
        store.write_config("A", "1", &json!({"n": 1})).await.unwrap();
        store.write_config("B", "1", &json!({"n": 3})).await.unwrap();

        let dump = store.dump_configs().await.unwrap();
        assert_eq!(dump.keys().cloned().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(dump["B"], vec![json!({"n": 3}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn dry_run_replace_changes_nothing() {
        let store = ConfigStore::in_memory();
        store.write_config(T, "keep", &json!({"v": 1})).await.unwrap();
        let before = serde_json::to_vec(&store.dump_configs().await.unwrap()).unwrap();

        let mut data = BTreeMap::new();
        data.insert(
            ConfigType::StandardWorkspace.name().to_string(),
            vec![json!({"workspaceId": "w1", "name": "default"})],
        );
        let would_insert = store.replace_all_configs(&data, true).await.unwrap();

        let after = serde_json::to_vec(&store.dump_configs().await.unwrap()).unwrap();
        assert_eq!(would_insert, 1);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn replace_all_clears_then_inserts_with_derived_ids() {
        let store = ConfigStore::in_memory();
        store.write_config(T, "old", &json!({"v": 1})).await.unwrap();

        let mut data = BTreeMap::new();
        data.insert(
            "STANDARD_WORKSPACE".to_string(),
            vec![json!({"workspaceId": "w1", "name": "default"})],
        );
        data.insert(
            "STANDARD_SYNC_SUMMARY".to_string(),
            vec![json!({"status": "completed"}), json!({"status": "failed"})],
        );

        let inserted = store.replace_all_configs(&data, false).await.unwrap();
        assert_eq!(inserted, 3);

        assert!(store.get_config(T, "old").await.unwrap_err().is_not_found());
        assert_eq!(
            store.get_config("STANDARD_WORKSPACE", "w1").await.unwrap()["name"],
            json!("default")
        );
        assert_eq!(
            store.list_configs("STANDARD_SYNC_SUMMARY").await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn failed_replace_leaves_prior_state_intact() {
        let store = ConfigStore::in_memory();
        store.write_config(T, "keep", &json!({"v": 1})).await.unwrap();

        let mut data = BTreeMap::new();
        data.insert(
            "STANDARD_WORKSPACE".to_string(),
            vec![json!({"name": "no id"})],
        );

        let err = store.replace_all_configs(&data, false).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.get_config(T, "keep").await.unwrap(), json!({"v": 1}));
    }

    #[tokio::test]
    async fn typed_helpers_use_the_model_config_type() {
        let store = ConfigStore::in_memory();
        let definition = StandardSourceDefinition::new(
            "def-1",
            "Postgres",
            "airbyte/source-postgres",
            "0.3.5",
        );

        store.write_typed("def-1", &definition).await.unwrap();

        let back: StandardSourceDefinition = store.get_typed("def-1").await.unwrap();
        assert_eq!(back, definition);
        assert_eq!(
            store.list_typed::<StandardSourceDefinition>().await.unwrap(),
            vec![definition]
        );
    }

    /// Engine whose point lookups report every row twice
    struct DuplicatingStorage(FileStorage);

    struct DuplicatingTransaction(Box<dyn StorageTransaction>);

    #[async_trait]
    impl StorageEngine for DuplicatingStorage {
        fn name(&self) -> &'static str {
            "duplicating"
        }

        async fn begin(&self) -> Result<Box<dyn StorageTransaction>> {
            Ok(Box::new(DuplicatingTransaction(self.0.begin().await?)))
        }
    }

    #[async_trait]
    impl StorageTransaction for DuplicatingTransaction {
        async fn is_empty(&mut self) -> Result<bool> {
            self.0.is_empty().await
        }
        async fn fetch(&mut self, t: &str, id: &str) -> Result<Vec<ConfigRecord>> {
            let rows = self.0.fetch(t, id).await?;
            Ok(rows.iter().chain(rows.iter()).cloned().collect())
        }
        async fn scan(&mut self, t: Option<&str>) -> Result<Vec<ConfigRecord>> {
            self.0.scan(t).await
        }
        async fn insert(&mut self, record: ConfigRecord) -> Result<u64> {
            self.0.insert(record).await
        }
        async fn update(
            &mut self,
            t: &str,
            id: &str,
            blob: &Value,
            ts: DateTime<Utc>,
        ) -> Result<u64> {
            self.0.update(t, id, blob, ts).await
        }
        async fn upsert(&mut self, t: &str, id: &str, blob: &Value, ts: DateTime<Utc>) -> Result<()> {
            self.0.upsert(t, id, blob, ts).await
        }
        async fn delete(&mut self, t: &str, id: &str) -> Result<u64> {
            self.0.delete(t, id).await
        }
        async fn truncate(&mut self) -> Result<()> {
            self.0.truncate().await
        }
        async fn commit(self: Box<Self>) -> Result<()> {
            self.0.commit().await
        }
    }

    #[tokio::test]
    async fn duplicate_rows_are_an_invariant_violation() {
        let store = ConfigStore::new(
            Arc::new(DuplicatingStorage(FileStorage::in_memory())),
            Arc::new(ConfigTypeCatalog::standard()),
        );
        store.write_config(T, "a", &json!({})).await.unwrap();

        let err = store.get_config(T, "a").await.unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
