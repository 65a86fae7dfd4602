//! Startup merge of the bundled connector catalogue into a live store.
//!
//! An empty store receives a full copy of the seed. A populated store only
//! has its source and destination definitions refreshed: new repositories
//! are inserted, definitions whose `dockerImageTag` differs are updated in
//! place, and any definition referenced by a sync is left alone. Nothing is
//! ever deleted or downgraded by this pass.

use crate::backend::StorageTransaction;
use crate::seed::ConfigSource;
use crate::store::insert_config_record;
use crate::ConfigStore;
use chrono::{DateTime, Utc};
use confdb_core::{ConfigType, Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

const DOCKER_REPOSITORY: &str = "dockerRepository";
const DOCKER_IMAGE_TAG: &str = "dockerImageTag";
const SYNC_SOURCE_ID: &str = "sourceId";
const SYNC_DESTINATION_ID: &str = "destinationId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// The store was empty and received every seed record
    FullCopy,
    /// Connector definitions were merged into existing content
    Merge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub mode: ReconcileMode,
    pub inserted: usize,
    pub updated: usize,
    pub per_type: BTreeMap<String, TypeCounts>,
}

impl ReconcileReport {
    fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            inserted: 0,
            updated: 0,
            per_type: BTreeMap::new(),
        }
    }

    fn record(&mut self, config_type: &str, counts: TypeCounts) {
        self.inserted += counts.inserted;
        self.updated += counts.updated;
        let entry = self.per_type.entry(config_type.to_string()).or_default();
        entry.inserted += counts.inserted;
        entry.updated += counts.updated;
    }

    /// Counts for one config type; zero if the pass never touched it
    pub fn counts(&self, config_type: impl AsRef<str>) -> TypeCounts {
        self.per_type
            .get(config_type.as_ref())
            .copied()
            .unwrap_or_default()
    }
}

/// Existing definition for one docker repository
#[derive(Debug, Clone)]
struct CurrentDefinition {
    config_id: String,
    version: Option<String>,
}

pub struct SeedReconciler {
    store: ConfigStore,
    span: Span,
}

impl SeedReconciler {
    pub fn new(store: ConfigStore) -> Self {
        let span = info_span!(parent: store.span(), "seed_reconciler");
        Self { store, span }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run one reconciliation pass against `seed`.
    ///
    /// The emptiness check, every seed read and every write share one storage
    /// transaction: any failure rolls the whole pass back. The seed must not
    /// be backed by the same storage engine as the target store.
    pub async fn reconcile(&self, seed: &dyn ConfigSource) -> Result<ReconcileReport> {
        let mut tx = self.store.begin().await?;

        let report = if tx.is_empty().await? {
            self.copy_configs_from_seed(tx.as_mut(), seed).await?
        } else {
            self.update_configs_from_seed(tx.as_mut(), seed).await?
        };

        tx.commit().await?;
        Ok(report)
    }

    async fn copy_configs_from_seed(
        &self,
        tx: &mut dyn StorageTransaction,
        seed: &dyn ConfigSource,
    ) -> Result<ReconcileReport> {
        info!(parent: &self.span, "Loading data to config database...");

        let seed_configs = seed.dump_configs().await.map_err(|e| Error::Reconciliation {
            config_type: "seed dump".to_string(),
            attempted: 0,
            source: Box::new(e),
        })?;

        let catalog = self.store.catalog().clone();
        let timestamp = Utc::now();
        let mut report = ReconcileReport::new(ReconcileMode::FullCopy);

        for (config_type, entries) in seed_configs {
            let mut counts = TypeCounts::default();
            for (index, config_blob) in entries.into_iter().enumerate() {
                let inserted = async {
                    if config_type
                        .parse::<ConfigType>()
                        .is_ok_and(|t| t.is_connector_definition())
                    {
                        connector_coordinates(&config_type, &config_blob)?;
                    }
                    let config_id = catalog.derive_config_id(&config_type, &config_blob)?;
                    insert_config_record(
                        &mut *tx,
                        &self.span,
                        timestamp,
                        &config_type,
                        &config_id,
                        config_blob,
                    )
                    .await
                }
                .await
                .map_err(|e| Error::Reconciliation {
                    config_type: config_type.clone(),
                    attempted: index + 1,
                    source: Box::new(e),
                })?;
                counts.inserted += inserted;
            }
            report.record(&config_type, counts);
        }

        info!(
            parent: &self.span,
            "Config database data loading completed with {} records", report.inserted
        );
        Ok(report)
    }

    async fn update_configs_from_seed(
        &self,
        tx: &mut dyn StorageTransaction,
        seed: &dyn ConfigSource,
    ) -> Result<ReconcileReport> {
        info!(
            parent: &self.span,
            "Config database has been initialized; updating connector definitions from the seed if necessary..."
        );

        let used_connector_repos = used_connector_repos(tx).await?;
        let mut current_repo_to_id_and_version = self.current_repo_to_id_and_version(tx).await?;

        let timestamp = Utc::now();
        let mut report = ReconcileReport::new(ReconcileMode::Merge);

        for config_type in ConfigType::CONNECTOR_DEFINITIONS {
            let latest_definitions =
                seed.list_configs(config_type.name())
                    .await
                    .map_err(|e| Error::Reconciliation {
                        config_type: config_type.name().to_string(),
                        attempted: 0,
                        source: Box::new(e),
                    })?;

            let counts = self
                .update_connector_definitions(
                    tx,
                    timestamp,
                    config_type,
                    &latest_definitions,
                    &used_connector_repos,
                    &mut current_repo_to_id_and_version,
                )
                .await?;
            report.record(config_type.name(), counts);
        }

        info!(
            parent: &self.span,
            "Connector definitions have been updated ({} new connectors, and {} updates)",
            report.inserted,
            report.updated
        );
        Ok(report)
    }

    async fn update_connector_definitions(
        &self,
        tx: &mut dyn StorageTransaction,
        timestamp: DateTime<Utc>,
        config_type: ConfigType,
        latest_definitions: &[Value],
        used_connector_repos: &HashSet<String>,
        current_repo_to_id_and_version: &mut HashMap<String, CurrentDefinition>,
    ) -> Result<TypeCounts> {
        let name = config_type.name();
        let mut counts = TypeCounts::default();

        for (index, latest_definition) in latest_definitions.iter().enumerate() {
            self.update_connector_definition(
                tx,
                timestamp,
                config_type,
                latest_definition,
                used_connector_repos,
                current_repo_to_id_and_version,
                &mut counts,
            )
            .await
            .map_err(|e| Error::Reconciliation {
                config_type: name.to_string(),
                attempted: index + 1,
                source: Box::new(e),
            })?;
        }

        Ok(counts)
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_connector_definition(
        &self,
        tx: &mut dyn StorageTransaction,
        timestamp: DateTime<Utc>,
        config_type: ConfigType,
        latest_definition: &Value,
        used_connector_repos: &HashSet<String>,
        current_repo_to_id_and_version: &mut HashMap<String, CurrentDefinition>,
        counts: &mut TypeCounts,
    ) -> Result<()> {
        let name = config_type.name();
        let (repository, latest_version) = connector_coordinates(name, latest_definition)?;

        // Keyed by the definition's own id, even though the set holds sync
        // references; kept as is so existing behaviour is preserved.
        let definition_id = config_type
            .id_field_name()
            .and_then(|field| scalar_string(latest_definition.get(field)));
        if let Some(id) = definition_id.as_deref() {
            if used_connector_repos.contains(id) {
                debug!(parent: &self.span, "Skipping {} {}: in use", name, id);
                return Ok(());
            }
        }

        let Some(current) = current_repo_to_id_and_version.get(repository).cloned() else {
            let config_id = Uuid::new_v4().to_string();
            counts.inserted += insert_config_record(
                tx,
                &self.span,
                timestamp,
                name,
                &config_id,
                latest_definition.clone(),
            )
            .await?;
            current_repo_to_id_and_version.insert(
                repository.to_string(),
                CurrentDefinition {
                    config_id,
                    version: Some(latest_version.to_string()),
                },
            );
            return Ok(());
        };

        if used_connector_repos.contains(&current.config_id) {
            debug!(
                parent: &self.span,
                "Skipping {} {}: existing definition {} is in use",
                name,
                repository,
                current.config_id
            );
            return Ok(());
        }

        if current.version.as_deref() == Some(latest_version) {
            return Ok(());
        }

        info!(
            parent: &self.span,
            "Updating {} record {} ({} -> {})",
            name,
            current.config_id,
            current.version.as_deref().unwrap_or("unknown"),
            latest_version
        );
        let updated = tx
            .update(name, &current.config_id, latest_definition, timestamp)
            .await?;
        if updated == 0 {
            // The repository is held by a row of the other definition type
            warn!(
                parent: &self.span,
                "{} config {} was not found for update; repository {} left as is",
                name,
                current.config_id,
                repository
            );
            return Ok(());
        }
        if updated > 1 {
            warn!(
                parent: &self.span,
                "{} config {} has been updated; updated record count: {}",
                name,
                current.config_id,
                updated
            );
        }
        counts.updated += updated as usize;

        if let Some(entry) = current_repo_to_id_and_version.get_mut(repository) {
            entry.version = Some(latest_version.to_string());
        }
        Ok(())
    }

    /// Docker repository -> (config id, image tag) over both definition kinds
    async fn current_repo_to_id_and_version(
        &self,
        tx: &mut dyn StorageTransaction,
    ) -> Result<HashMap<String, CurrentDefinition>> {
        let mut current: HashMap<String, CurrentDefinition> = HashMap::new();

        for config_type in ConfigType::CONNECTOR_DEFINITIONS {
            for record in tx.scan(Some(config_type.name())).await? {
                let Some(repository) = scalar_string(record.config_blob.get(DOCKER_REPOSITORY))
                else {
                    warn!(
                        parent: &self.span,
                        "{} record {} has no {}; ignoring it",
                        config_type,
                        record.config_id,
                        DOCKER_REPOSITORY
                    );
                    continue;
                };

                if let Some(existing) = current.get(&repository) {
                    warn!(
                        parent: &self.span,
                        "Repository {} is defined by both {} and {}; keeping the first",
                        repository,
                        existing.config_id,
                        record.config_id
                    );
                    continue;
                }

                let version = scalar_string(record.config_blob.get(DOCKER_IMAGE_TAG));
                current.insert(
                    repository,
                    CurrentDefinition {
                        config_id: record.config_id,
                        version,
                    },
                );
            }
        }

        Ok(current)
    }
}

/// Ids referenced by any sync through `sourceId` or `destinationId`
async fn used_connector_repos(tx: &mut dyn StorageTransaction) -> Result<HashSet<String>> {
    let syncs = tx.scan(Some(ConfigType::StandardSync.name())).await?;

    Ok(syncs
        .iter()
        .flat_map(|record| {
            [SYNC_SOURCE_ID, SYNC_DESTINATION_ID]
                .into_iter()
                .filter_map(|field| scalar_string(record.config_blob.get(field)))
        })
        .collect())
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `dockerRepository` and `dockerImageTag` of a seed connector definition
fn connector_coordinates<'a>(
    config_type: &str,
    definition: &'a Value,
) -> Result<(&'a str, &'a str)> {
    Ok((
        required_str(config_type, definition, DOCKER_REPOSITORY)?,
        required_str(config_type, definition, DOCKER_IMAGE_TAG)?,
    ))
}

fn required_str<'a>(config_type: &str, definition: &'a Value, field: &str) -> Result<&'a str> {
    match definition.get(field) {
        Some(Value::String(value)) => Ok(value),
        None | Some(Value::Null) => Err(Error::Validation(format!(
            "{} seed definition is missing '{}'",
            config_type, field
        ))),
        Some(other) => Err(Error::Validation(format!(
            "{} seed definition field '{}' must be a string, got {}",
            config_type, field, other
        ))),
    }
}
