use crate::ConfigStore;
use confdb_core::{ConfigTypeCatalog, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Checks a blob against the schema of its config type
pub trait ConfigValidator: Send + Sync {
    fn validate(&self, config_type: &str, config_blob: &Value) -> Result<()>;
}

/// Validates with the decoders registered in the config type catalogue.
/// Types without a decoder are accepted as they are.
pub struct CatalogValidator {
    catalog: Arc<ConfigTypeCatalog>,
}

impl CatalogValidator {
    pub fn new(catalog: Arc<ConfigTypeCatalog>) -> Self {
        Self { catalog }
    }
}

impl ConfigValidator for CatalogValidator {
    fn validate(&self, config_type: &str, config_blob: &Value) -> Result<()> {
        self.catalog.decode(config_type, config_blob)
    }
}

/// [`ConfigStore`] wrapper validating blobs before writes and after reads
#[derive(Clone)]
pub struct ValidatingConfigStore {
    inner: ConfigStore,
    validator: Arc<dyn ConfigValidator>,
}

impl ValidatingConfigStore {
    pub fn new(inner: ConfigStore, validator: Arc<dyn ConfigValidator>) -> Self {
        Self { inner, validator }
    }

    pub fn inner(&self) -> &ConfigStore {
        &self.inner
    }

    pub async fn get_config(&self, config_type: &str, config_id: &str) -> Result<Value> {
        let blob = self.inner.get_config(config_type, config_id).await?;
        self.validator.validate(config_type, &blob)?;
        Ok(blob)
    }

    pub async fn list_configs(&self, config_type: &str) -> Result<Vec<Value>> {
        let blobs = self.inner.list_configs(config_type).await?;
        for blob in &blobs {
            self.validator.validate(config_type, blob)?;
        }
        Ok(blobs)
    }

    pub async fn write_config(
        &self,
        config_type: &str,
        config_id: &str,
        config_blob: &Value,
    ) -> Result<()> {
        self.validator.validate(config_type, config_blob)?;
        self.inner
            .write_config(config_type, config_id, config_blob)
            .await
    }

    pub async fn delete_config(&self, config_type: &str, config_id: &str) -> Result<()> {
        self.inner.delete_config(config_type, config_id).await
    }

    pub async fn dump_configs(&self) -> Result<BTreeMap<String, Vec<Value>>> {
        let dump = self.inner.dump_configs().await?;
        for (config_type, blobs) in &dump {
            for blob in blobs {
                self.validator.validate(config_type, blob)?;
            }
        }
        Ok(dump)
    }

    /// Every object is validated before the store is cleared
    pub async fn replace_all_configs(
        &self,
        configs: &BTreeMap<String, Vec<Value>>,
        dry_run: bool,
    ) -> Result<usize> {
        for (config_type, blobs) in configs {
            for blob in blobs {
                self.validator.validate(config_type, blob)?;
            }
        }
        self.inner.replace_all_configs(configs, dry_run).await
    }
}
