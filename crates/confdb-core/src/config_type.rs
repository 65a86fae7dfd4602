use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The standard kinds of configuration document known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigType {
    StandardWorkspace,
    StandardSourceDefinition,
    StandardDestinationDefinition,
    SourceConnection,
    DestinationConnection,
    StandardSync,
    StandardSyncOperation,
    StandardSyncSummary,
    StandardSyncOutput,
}

impl ConfigType {
    pub const ALL: [ConfigType; 9] = [
        ConfigType::StandardWorkspace,
        ConfigType::StandardSourceDefinition,
        ConfigType::StandardDestinationDefinition,
        ConfigType::SourceConnection,
        ConfigType::DestinationConnection,
        ConfigType::StandardSync,
        ConfigType::StandardSyncOperation,
        ConfigType::StandardSyncSummary,
        ConfigType::StandardSyncOutput,
    ];

    /// Connector definition kinds, in the order reconciliation visits them.
    pub const CONNECTOR_DEFINITIONS: [ConfigType; 2] = [
        ConfigType::StandardSourceDefinition,
        ConfigType::StandardDestinationDefinition,
    ];

    /// Canonical name as stored in the `config_type` column.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StandardWorkspace => "STANDARD_WORKSPACE",
            Self::StandardSourceDefinition => "STANDARD_SOURCE_DEFINITION",
            Self::StandardDestinationDefinition => "STANDARD_DESTINATION_DEFINITION",
            Self::SourceConnection => "SOURCE_CONNECTION",
            Self::DestinationConnection => "DESTINATION_CONNECTION",
            Self::StandardSync => "STANDARD_SYNC",
            Self::StandardSyncOperation => "STANDARD_SYNC_OPERATION",
            Self::StandardSyncSummary => "STANDARD_SYNC_SUMMARY",
            Self::StandardSyncOutput => "STANDARD_SYNC_OUTPUT",
        }
    }

    /// Field inside the blob that carries the document's id, if any.
    pub fn id_field_name(&self) -> Option<&'static str> {
        match self {
            Self::StandardWorkspace => Some("workspaceId"),
            Self::StandardSourceDefinition => Some("sourceDefinitionId"),
            Self::StandardDestinationDefinition => Some("destinationDefinitionId"),
            Self::SourceConnection => Some("sourceId"),
            Self::DestinationConnection => Some("destinationId"),
            Self::StandardSync => Some("connectionId"),
            Self::StandardSyncOperation => Some("operationId"),
            Self::StandardSyncSummary | Self::StandardSyncOutput => None,
        }
    }

    pub fn is_connector_definition(&self) -> bool {
        Self::CONNECTOR_DEFINITIONS.contains(self)
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Configuration(format!("Unknown config type '{}'", s)))
    }
}

impl AsRef<str> for ConfigType {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for config_type in ConfigType::ALL {
            assert_eq!(config_type.name().parse::<ConfigType>().unwrap(), config_type);
        }
        assert_eq!(
            "standard_sync".parse::<ConfigType>().unwrap(),
            ConfigType::StandardSync
        );
        assert!("NOPE".parse::<ConfigType>().is_err());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&ConfigType::StandardDestinationDefinition).unwrap();
        assert_eq!(json, "\"STANDARD_DESTINATION_DEFINITION\"");
    }

    #[test]
    fn summaries_have_no_id_field() {
        assert_eq!(ConfigType::StandardSyncSummary.id_field_name(), None);
        assert_eq!(
            ConfigType::StandardSourceDefinition.id_field_name(),
            Some("sourceDefinitionId")
        );
    }
}
