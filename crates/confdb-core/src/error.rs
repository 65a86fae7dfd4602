use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config not found: {config_type} {config_id}")]
    NotFound {
        config_type: String,
        config_id: String,
    },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Any failure raised by a storage engine. Engine-specific errors are
    /// attached as context and never leak their concrete type.
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Reconciliation of {config_type} failed after {attempted} seed record(s): {source}")]
    Reconciliation {
        config_type: String,
        attempted: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_found(config_type: impl Into<String>, config_id: impl Into<String>) -> Self {
        Self::NotFound {
            config_type: config_type.into(),
            config_id: config_id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
