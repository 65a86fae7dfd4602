mod config_type;
mod error;
pub mod models;
mod record;
mod registry;

pub use config_type::ConfigType;
pub use error::{Error, Result};
pub use models::{
    ConfigDocument, ConnectorDefinition, DestinationConnection, SourceConnection,
    StandardDestinationDefinition, StandardSourceDefinition, StandardSync, StandardSyncOperation,
    StandardWorkspace,
};
pub use record::ConfigRecord;
pub use registry::{ConfigTypeCatalog, ConfigTypeEntry, DecodeFn};
