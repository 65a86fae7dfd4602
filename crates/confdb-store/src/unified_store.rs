use crate::backend::{StorageEngine, StorageTransaction};
use crate::{FileStorage, PgStorage};
use async_trait::async_trait;
use confdb_core::Result;
use std::sync::Arc;

/// Storage that can use either YAML files (or plain memory) or PostgreSQL
pub enum UnifiedStorage {
    File(FileStorage),
    Postgres(Arc<PgStorage>),
}

impl UnifiedStorage {
    pub fn in_memory() -> Self {
        Self::File(FileStorage::in_memory())
    }

    /// Create from a YAML snapshot directory
    pub fn from_files(storage_dir: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::File(FileStorage::open(storage_dir)?))
    }

    /// Create from PostgreSQL
    pub async fn from_postgres(database_url: &str, max_connections: u32) -> Result<Self> {
        Ok(Self::Postgres(Arc::new(
            PgStorage::new(database_url, max_connections).await?,
        )))
    }
}

#[async_trait]
impl StorageEngine for UnifiedStorage {
    fn name(&self) -> &'static str {
        match self {
            Self::File(storage) => storage.name(),
            Self::Postgres(storage) => storage.name(),
        }
    }

    async fn begin(&self) -> Result<Box<dyn StorageTransaction>> {
        match self {
            Self::File(storage) => storage.begin().await,
            Self::Postgres(storage) => storage.begin().await,
        }
    }
}
