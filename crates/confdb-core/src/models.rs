use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConfigType;

/// A typed configuration document bound to one config type.
pub trait ConfigDocument: Serialize + DeserializeOwned + Send + Sync {
    const CONFIG_TYPE: ConfigType;
}

/// Common view over source and destination definitions.
pub trait ConnectorDefinition: ConfigDocument {
    fn definition_id(&self) -> &str;
    fn docker_repository(&self) -> &str;
    fn docker_image_tag(&self) -> &str;
}

/// Workspace settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardWorkspace {
    pub workspace_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Fields this model does not name are carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument for StandardWorkspace {
    const CONFIG_TYPE: ConfigType = ConfigType::StandardWorkspace;
}

/// Source connector definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSourceDefinition {
    pub source_definition_id: String,

    pub name: String,

    /// Catalogue key used by seed reconciliation
    pub docker_repository: String,

    /// Version string; only compared for equality
    pub docker_image_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StandardSourceDefinition {
    pub fn new(
        source_definition_id: impl Into<String>,
        name: impl Into<String>,
        docker_repository: impl Into<String>,
        docker_image_tag: impl Into<String>,
    ) -> Self {
        Self {
            source_definition_id: source_definition_id.into(),
            name: name.into(),
            docker_repository: docker_repository.into(),
            docker_image_tag: docker_image_tag.into(),
            documentation_url: None,
            icon: None,
            extra: Map::new(),
        }
    }
}

impl ConfigDocument for StandardSourceDefinition {
    const CONFIG_TYPE: ConfigType = ConfigType::StandardSourceDefinition;
}

impl ConnectorDefinition for StandardSourceDefinition {
    fn definition_id(&self) -> &str {
        &self.source_definition_id
    }

    fn docker_repository(&self) -> &str {
        &self.docker_repository
    }

    fn docker_image_tag(&self) -> &str {
        &self.docker_image_tag
    }
}

/// Destination connector definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDestinationDefinition {
    pub destination_definition_id: String,

    pub name: String,

    pub docker_repository: String,

    pub docker_image_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StandardDestinationDefinition {
    pub fn new(
        destination_definition_id: impl Into<String>,
        name: impl Into<String>,
        docker_repository: impl Into<String>,
        docker_image_tag: impl Into<String>,
    ) -> Self {
        Self {
            destination_definition_id: destination_definition_id.into(),
            name: name.into(),
            docker_repository: docker_repository.into(),
            docker_image_tag: docker_image_tag.into(),
            documentation_url: None,
            icon: None,
            extra: Map::new(),
        }
    }
}

impl ConfigDocument for StandardDestinationDefinition {
    const CONFIG_TYPE: ConfigType = ConfigType::StandardDestinationDefinition;
}

impl ConnectorDefinition for StandardDestinationDefinition {
    fn definition_id(&self) -> &str {
        &self.destination_definition_id
    }

    fn docker_repository(&self) -> &str {
        &self.docker_repository
    }

    fn docker_image_tag(&self) -> &str {
        &self.docker_image_tag
    }
}

/// A configured source (definition plus user settings)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConnection {
    pub source_id: String,

    pub source_definition_id: String,

    pub workspace_id: String,

    pub name: String,

    #[serde(default)]
    pub configuration: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument for SourceConnection {
    const CONFIG_TYPE: ConfigType = ConfigType::SourceConnection;
}

/// A configured destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConnection {
    pub destination_id: String,

    pub destination_definition_id: String,

    pub workspace_id: String,

    pub name: String,

    #[serde(default)]
    pub configuration: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument for DestinationConnection {
    const CONFIG_TYPE: ConfigType = ConfigType::DestinationConnection;
}

/// A configured pipeline between one source and one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSync {
    pub connection_id: String,

    pub source_id: String,

    pub destination_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StandardSync {
    pub fn new(
        connection_id: impl Into<String>,
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            name: None,
            status: None,
            extra: Map::new(),
        }
    }
}

impl ConfigDocument for StandardSync {
    const CONFIG_TYPE: ConfigType = ConfigType::StandardSync;
}

/// A post-sync operation attached to connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSyncOperation {
    pub operation_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_type: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument for StandardSyncOperation {
    const CONFIG_TYPE: ConfigType = ConfigType::StandardSyncOperation;
}
