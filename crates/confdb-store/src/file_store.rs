use crate::backend::{StorageEngine, StorageTransaction};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confdb_core::{ConfigRecord, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Rows = BTreeMap<(String, String), ConfigRecord>;

const SNAPSHOT_FILE: &str = "configs.yaml";

fn key(config_type: &str, config_id: &str) -> (String, String) {
    (config_type.to_string(), config_id.to_string())
}

/// Storage engine keeping every record in an ordered map.
///
/// A transaction holds the map's lock for its whole life, so transactions
/// are serialised. When opened on a directory, each commit rewrites
/// `configs.yaml` there before the new state becomes visible.
#[derive(Debug, Clone)]
pub struct FileStorage {
    rows: Arc<Mutex<Rows>>,
    storage_dir: Option<PathBuf>,
}

impl FileStorage {
    /// Volatile storage, mostly useful for tests and previews
    pub fn in_memory() -> Self {
        Self {
            rows: Arc::new(Mutex::new(Rows::new())),
            storage_dir: None,
        }
    }

    /// Load storage from a directory, starting empty if nothing was saved yet
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_dir = storage_dir.as_ref();
        let snapshot_path = storage_dir.join(SNAPSHOT_FILE);

        let rows = if snapshot_path.exists() {
            let content = std::fs::read_to_string(&snapshot_path)
                .with_context(|| format!("Failed to read {}", snapshot_path.display()))?;
            let records: Vec<ConfigRecord> = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", snapshot_path.display()))?;

            let mut rows = Rows::new();
            for record in records {
                let k = key(&record.config_type, &record.config_id);
                if rows.insert(k, record).is_some() {
                    return Err(anyhow!(
                        "{} contains duplicate records for one (config_type, config_id)",
                        snapshot_path.display()
                    )
                    .into());
                }
            }
            rows
        } else {
            Rows::new()
        };

        Ok(Self {
            rows: Arc::new(Mutex::new(rows)),
            storage_dir: Some(storage_dir.to_path_buf()),
        })
    }
}

async fn persist(storage_dir: &Path, rows: &Rows) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(storage_dir)
        .await
        .context("Failed to create storage directory")?;

    let records: Vec<&ConfigRecord> = rows.values().collect();
    let yaml = serde_yaml::to_string(&records).context("Failed to serialize configs")?;

    // Write-then-rename so a crash never leaves a half written snapshot
    let tmp_path = storage_dir.join(format!("{}.tmp", SNAPSHOT_FILE));
    tokio::fs::write(&tmp_path, yaml)
        .await
        .context("Failed to write configs snapshot")?;
    tokio::fs::rename(&tmp_path, storage_dir.join(SNAPSHOT_FILE))
        .await
        .context("Failed to replace configs.yaml")?;

    Ok(())
}

#[async_trait]
impl StorageEngine for FileStorage {
    fn name(&self) -> &'static str {
        if self.storage_dir.is_some() {
            "file"
        } else {
            "memory"
        }
    }

    async fn begin(&self) -> Result<Box<dyn StorageTransaction>> {
        let committed = self.rows.clone().lock_owned().await;
        Ok(Box::new(FileTransaction {
            committed,
            working: None,
            storage_dir: self.storage_dir.clone(),
        }))
    }
}

/// Copy-on-write view over the committed rows
pub struct FileTransaction {
    committed: OwnedMutexGuard<Rows>,
    working: Option<Rows>,
    storage_dir: Option<PathBuf>,
}

impl FileTransaction {
    fn rows(&self) -> &Rows {
        self.working.as_ref().unwrap_or(&*self.committed)
    }

    fn rows_mut(&mut self) -> &mut Rows {
        let Self {
            committed, working, ..
        } = self;
        working.get_or_insert_with(|| Rows::clone(&**committed))
    }
}

#[async_trait]
impl StorageTransaction for FileTransaction {
    async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.rows().is_empty())
    }

    async fn fetch(&mut self, config_type: &str, config_id: &str) -> Result<Vec<ConfigRecord>> {
        Ok(self
            .rows()
            .get(&key(config_type, config_id))
            .cloned()
            .into_iter()
            .collect())
    }

    async fn scan(&mut self, config_type: Option<&str>) -> Result<Vec<ConfigRecord>> {
        Ok(self
            .rows()
            .values()
            .filter(|r| config_type.map_or(true, |t| r.config_type == t))
            .cloned()
            .collect())
    }

    async fn insert(&mut self, record: ConfigRecord) -> Result<u64> {
        let k = key(&record.config_type, &record.config_id);
        let rows = self.rows_mut();
        if rows.contains_key(&k) {
            return Err(anyhow!(
                "Duplicate key: {} record {} already exists",
                record.config_type,
                record.config_id
            )
            .into());
        }
        rows.insert(k, record);
        Ok(1)
    }

    async fn update(
        &mut self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<u64> {
        match self.rows_mut().get_mut(&key(config_type, config_id)) {
            Some(record) => {
                record.apply_update(config_blob.clone(), timestamp);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn upsert(
        &mut self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.rows_mut()
            .entry(key(config_type, config_id))
            .and_modify(|record| record.apply_update(config_blob.clone(), timestamp))
            .or_insert_with(|| {
                ConfigRecord::new(config_type, config_id, config_blob.clone(), timestamp)
            });
        Ok(())
    }

    async fn delete(&mut self, config_type: &str, config_id: &str) -> Result<u64> {
        Ok(self
            .rows_mut()
            .remove(&key(config_type, config_id))
            .map_or(0, |_| 1))
    }

    async fn truncate(&mut self) -> Result<()> {
        self.working = Some(Rows::new());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let FileTransaction {
            mut committed,
            working,
            storage_dir,
        } = *self;

        // Read-only transactions have nothing to publish
        let Some(working) = working else {
            return Ok(());
        };

        if let Some(dir) = storage_dir {
            persist(&dir, &working).await?;
        }
        *committed = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn uncommitted_changes_are_discarded() {
        let storage = FileStorage::in_memory();

        let mut tx = storage.begin().await.unwrap();
        tx.upsert("T", "a", &json!({"v": 1}), Utc::now()).await.unwrap();
        drop(tx);

        let mut tx = storage.begin().await.unwrap();
        assert!(tx.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn scan_is_ordered_by_type_then_id() {
        let storage = FileStorage::in_memory();
        let now = Utc::now();

        let mut tx = storage.begin().await.unwrap();
        for (t, id) in [("B", "2"), ("A", "b"), ("B", "1"), ("A", "a")] {
            tx.insert(ConfigRecord::new(t, id, json!({}), now))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let keys: Vec<(String, String)> = tx
            .scan(None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.config_type, r.config_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                key("A", "a"),
                key("A", "b"),
                key("B", "1"),
                key("B", "2")
            ]
        );

        let only_b = tx.scan(Some("B")).await.unwrap();
        assert_eq!(only_b.len(), 2);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_keys() {
        let storage = FileStorage::in_memory();
        let mut tx = storage.begin().await.unwrap();

        tx.insert(ConfigRecord::new("T", "a", json!({}), Utc::now()))
            .await
            .unwrap();
        let err = tx
            .insert(ConfigRecord::new("T", "a", json!({}), Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, confdb_core::Error::Storage(_)));
    }

    #[tokio::test]
    async fn upsert_keeps_created_at_and_monotonic_updated_at() {
        let storage = FileStorage::in_memory();
        let t0 = Utc::now();

        let mut tx = storage.begin().await.unwrap();
        tx.upsert("T", "a", &json!({"v": 1}), t0).await.unwrap();
        tx.upsert("T", "a", &json!({"v": 2}), t0 + Duration::seconds(5))
            .await
            .unwrap();
        tx.upsert("T", "a", &json!({"v": 3}), t0 - Duration::seconds(5))
            .await
            .unwrap();

        let record = tx.fetch("T", "a").await.unwrap().remove(0);
        assert_eq!(record.config_blob, json!({"v": 3}));
        assert_eq!(record.created_at, t0);
        assert_eq!(record.updated_at, t0 + Duration::seconds(5));
    }

    #[tokio::test]
    async fn truncate_then_commit_clears_everything() {
        let storage = FileStorage::in_memory();

        let mut tx = storage.begin().await.unwrap();
        tx.upsert("T", "a", &json!(1), Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        tx.truncate().await.unwrap();
        assert!(tx.is_empty().await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        assert!(tx.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn committed_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let blob = json!({"name": "Postgres", "tags": ["db", "sql"], "nested": {"port": 5432}});

        {
            let storage = FileStorage::open(dir.path()).unwrap();
            assert_eq!(storage.name(), "file");
            let mut tx = storage.begin().await.unwrap();
            tx.upsert("STANDARD_WORKSPACE", "w1", &blob, Utc::now())
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        assert!(dir.path().join(SNAPSHOT_FILE).exists());

        let storage = FileStorage::open(dir.path()).unwrap();
        let mut tx = storage.begin().await.unwrap();
        let records = tx.fetch("STANDARD_WORKSPACE", "w1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].config_blob, blob);
    }
}
