mod backend;
mod file_store;
mod pg_store;
mod reconcile;
mod seed;
mod store;
mod unified_store;
mod validating;

pub use backend::{StorageEngine, StorageTransaction};
pub use file_store::FileStorage;
pub use pg_store::PgStorage;
pub use reconcile::{ReconcileMode, ReconcileReport, SeedReconciler, TypeCounts};
pub use seed::{ConfigSource, YamlSeedSource};
pub use store::ConfigStore;
pub use unified_store::UnifiedStorage;
pub use validating::{CatalogValidator, ConfigValidator, ValidatingConfigStore};

// Re-export for convenience
pub use async_trait::async_trait;
