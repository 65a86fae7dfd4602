use crate::ConfigStore;
use anyhow::Context;
use async_trait::async_trait;
use confdb_core::{ConfigType, Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Read side shared by the live store and seed catalogues.
///
/// Anything implementing it can act as the desired state during
/// reconciliation or import, whether it comes from a bundled file or from
/// another live store.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Every document of one type, ordered by id
    async fn list_configs(&self, config_type: &str) -> Result<Vec<Value>>;

    /// Every document grouped by type
    async fn dump_configs(&self) -> Result<BTreeMap<String, Vec<Value>>>;
}

#[async_trait]
impl ConfigSource for ConfigStore {
    async fn list_configs(&self, config_type: &str) -> Result<Vec<Value>> {
        ConfigStore::list_configs(self, config_type).await
    }

    async fn dump_configs(&self) -> Result<BTreeMap<String, Vec<Value>>> {
        ConfigStore::dump_configs(self).await
    }
}

const SOURCE_DEFINITIONS_FILE: &str = "source_definitions.yaml";
const DESTINATION_DEFINITIONS_FILE: &str = "destination_definitions.yaml";

const BUNDLED_SOURCE_DEFINITIONS: &str = include_str!("../seed/source_definitions.yaml");
const BUNDLED_DESTINATION_DEFINITIONS: &str = include_str!("../seed/destination_definitions.yaml");

/// Read-only catalogue of connector definitions loaded from YAML
#[derive(Debug, Clone, Default)]
pub struct YamlSeedSource {
    configs: BTreeMap<String, Vec<Value>>,
}

impl YamlSeedSource {
    /// The catalogue compiled into this build
    pub fn bundled() -> Result<Self> {
        let mut seed = Self::default();
        seed.add_yaml(
            ConfigType::StandardSourceDefinition,
            BUNDLED_SOURCE_DEFINITIONS,
        )?;
        seed.add_yaml(
            ConfigType::StandardDestinationDefinition,
            BUNDLED_DESTINATION_DEFINITIONS,
        )?;
        Ok(seed)
    }

    /// Load `source_definitions.yaml` and `destination_definitions.yaml` from
    /// a directory. A missing file contributes no definitions.
    pub fn from_dir(seed_dir: impl AsRef<Path>) -> Result<Self> {
        let seed_dir = seed_dir.as_ref();
        let mut seed = Self::default();

        for (config_type, file_name) in [
            (ConfigType::StandardSourceDefinition, SOURCE_DEFINITIONS_FILE),
            (
                ConfigType::StandardDestinationDefinition,
                DESTINATION_DEFINITIONS_FILE,
            ),
        ] {
            let path = seed_dir.join(file_name);
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            seed.add_yaml(config_type, &content)?;
        }

        Ok(seed)
    }

    /// Build a catalogue from documents already in memory
    pub fn from_configs(configs: BTreeMap<String, Vec<Value>>) -> Result<Self> {
        let mut seed = Self::default();
        for (config_type, entries) in configs {
            let id_field = config_type
                .parse::<ConfigType>()
                .ok()
                .and_then(|t| t.id_field_name());
            seed.add_entries(&config_type, id_field, entries)?;
        }
        Ok(seed)
    }

    /// Parse a YAML list of documents of `config_type` into the catalogue
    pub fn add_yaml(&mut self, config_type: ConfigType, yaml: &str) -> Result<()> {
        let entries: Option<Vec<Value>> = serde_yaml::from_str(yaml)
            .with_context(|| format!("Failed to parse {} seed", config_type))?;
        self.add_entries(
            config_type.name(),
            config_type.id_field_name(),
            entries.unwrap_or_default(),
        )
    }

    fn add_entries(
        &mut self,
        config_type: &str,
        id_field: Option<&str>,
        entries: Vec<Value>,
    ) -> Result<()> {
        let mut list = self.configs.get(config_type).cloned().unwrap_or_default();
        list.extend(entries);

        let Some(id_field) = id_field else {
            self.configs.insert(config_type.to_string(), list);
            return Ok(());
        };

        let mut seen = HashSet::new();
        for entry in &list {
            let id = entry.get(id_field).and_then(Value::as_str).ok_or_else(|| {
                Error::Validation(format!(
                    "{} seed entry is missing '{}'",
                    config_type, id_field
                ))
            })?;
            if !seen.insert(id) {
                return Err(Error::Validation(format!(
                    "{} seed contains duplicate id {}",
                    config_type, id
                )));
            }
        }

        list.sort_by(|a, b| a[id_field].as_str().cmp(&b[id_field].as_str()));
        self.configs.insert(config_type.to_string(), list);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.configs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConfigSource for YamlSeedSource {
    async fn list_configs(&self, config_type: &str) -> Result<Vec<Value>> {
        Ok(self.configs.get(config_type).cloned().unwrap_or_default())
    }

    async fn dump_configs(&self) -> Result<BTreeMap<String, Vec<Value>>> {
        Ok(self
            .configs
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(t, entries)| (t.clone(), entries.clone()))
            .collect())
    }
}
