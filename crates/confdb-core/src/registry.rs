use crate::models::{
    ConfigDocument, DestinationConnection, SourceConnection, StandardDestinationDefinition,
    StandardSourceDefinition, StandardSync, StandardSyncOperation, StandardWorkspace,
};
use crate::{ConfigType, Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Checks that a blob decodes as the typed model registered for its type.
pub type DecodeFn = fn(&Value) -> serde_json::Result<()>;

/// Registry entry for one config type
#[derive(Debug, Clone)]
pub struct ConfigTypeEntry {
    pub id_field: Option<String>,
    pub decode: Option<DecodeFn>,
}

/// Process-wide catalogue of config types, built once at startup.
///
/// Maps each type name to the blob field holding its id (used when ids are
/// derived during bulk import) and a decode function for validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigTypeCatalog {
    entries: BTreeMap<String, ConfigTypeEntry>,
}

fn decode_as<T: ConfigDocument>(value: &Value) -> serde_json::Result<()> {
    T::deserialize(value).map(|_| ())
}

impl ConfigTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue of every standard type, with typed decoders where a model exists.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for config_type in ConfigType::ALL {
            catalog.register_untyped(config_type.name(), config_type.id_field_name());
        }

        catalog.register::<StandardWorkspace>();
        catalog.register::<StandardSourceDefinition>();
        catalog.register::<StandardDestinationDefinition>();
        catalog.register::<SourceConnection>();
        catalog.register::<DestinationConnection>();
        catalog.register::<StandardSync>();
        catalog.register::<StandardSyncOperation>();
        catalog
    }

    /// Register a typed document kind
    pub fn register<T: ConfigDocument>(&mut self) {
        let config_type = T::CONFIG_TYPE;
        self.entries.insert(
            config_type.name().to_string(),
            ConfigTypeEntry {
                id_field: config_type.id_field_name().map(str::to_string),
                decode: Some(decode_as::<T>),
            },
        );
    }

    /// Register a type known only by name
    pub fn register_untyped(&mut self, name: &str, id_field: Option<&str>) {
        self.entries.insert(
            name.to_string(),
            ConfigTypeEntry {
                id_field: id_field.map(str::to_string),
                decode: None,
            },
        );
    }

    pub fn get(&self, config_type: &str) -> Option<&ConfigTypeEntry> {
        self.entries.get(config_type)
    }

    pub fn id_field(&self, config_type: &str) -> Option<&str> {
        self.get(config_type).and_then(|e| e.id_field.as_deref())
    }

    /// Derive the config id for `blob` during bulk import.
    ///
    /// Types with a declared id field must carry a scalar value there; types
    /// without one get a fresh UUID.
    pub fn derive_config_id(&self, config_type: &str, blob: &Value) -> Result<String> {
        let Some(field) = self.id_field(config_type) else {
            return Ok(Uuid::new_v4().to_string());
        };

        match blob.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(Value::Null) | None => Err(Error::Validation(format!(
                "{} record is missing id field '{}'",
                config_type, field
            ))),
            Some(_) => Err(Error::Validation(format!(
                "{} record has a non-scalar id field '{}'",
                config_type, field
            ))),
        }
    }

    /// Run the registered decoder for `config_type`, if any.
    pub fn decode(&self, config_type: &str, blob: &Value) -> Result<()> {
        match self.get(config_type).and_then(|e| e.decode) {
            Some(decode) => decode(blob).map_err(|e| {
                Error::Validation(format!("Invalid {} document: {}", config_type, e))
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_id_field_is_used() {
        let catalog = ConfigTypeCatalog::standard();
        let blob = json!({"sourceDefinitionId": "abc", "name": "x"});

        let id = catalog
            .derive_config_id("STANDARD_SOURCE_DEFINITION", &blob)
            .unwrap();
        assert_eq!(id, "abc");
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let catalog = ConfigTypeCatalog::standard();
        let blob = json!({"workspaceId": 42});

        let id = catalog.derive_config_id("STANDARD_WORKSPACE", &blob).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn missing_id_field_is_a_validation_error() {
        let catalog = ConfigTypeCatalog::standard();
        let err = catalog
            .derive_config_id("STANDARD_SYNC", &json!({"sourceId": "s"}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn types_without_id_field_get_unique_synthetic_ids() {
        let catalog = ConfigTypeCatalog::standard();
        let blob = json!({"status": "completed"});

        let a = catalog.derive_config_id("STANDARD_SYNC_SUMMARY", &blob).unwrap();
        let b = catalog.derive_config_id("STANDARD_SYNC_SUMMARY", &blob).unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());

        // unregistered types behave the same way
        let c = catalog.derive_config_id("CUSTOM", &blob).unwrap();
        assert!(Uuid::parse_str(&c).is_ok());
    }

    #[test]
    fn decode_rejects_documents_that_do_not_fit_the_model() {
        let catalog = ConfigTypeCatalog::standard();

        let ok = json!({
            "destinationDefinitionId": "d",
            "name": "Postgres",
            "dockerRepository": "airbyte/destination-postgres",
            "dockerImageTag": "0.3.0"
        });
        assert!(catalog.decode("STANDARD_DESTINATION_DEFINITION", &ok).is_ok());

        let bad = json!({"destinationDefinitionId": "d"});
        let err = catalog
            .decode("STANDARD_DESTINATION_DEFINITION", &bad)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // no decoder registered
        assert!(catalog.decode("STANDARD_SYNC_SUMMARY", &bad).is_ok());
    }
}
