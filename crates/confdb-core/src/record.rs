use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored configuration document, unique per (config_type, config_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Kind of document, e.g. `STANDARD_SOURCE_DEFINITION`
    pub config_type: String,

    /// Identifier, unique within its config type
    pub config_id: String,

    /// The document itself; opaque to the store
    pub config_blob: Value,

    /// Set on first write and never changed afterwards
    pub created_at: DateTime<Utc>,

    /// Advanced on every write, never moves backwards
    pub updated_at: DateTime<Utc>,
}

impl ConfigRecord {
    pub fn new(
        config_type: impl Into<String>,
        config_id: impl Into<String>,
        config_blob: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            config_type: config_type.into(),
            config_id: config_id.into(),
            config_blob,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Replace the blob, keeping `updated_at` monotonic.
    pub fn apply_update(&mut self, config_blob: Value, timestamp: DateTime<Utc>) {
        self.config_blob = config_blob;
        self.updated_at = self.updated_at.max(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn update_never_moves_updated_at_backwards() {
        let now = Utc::now();
        let mut record = ConfigRecord::new("T", "a", json!({"v": 1}), now);

        record.apply_update(json!({"v": 2}), now - Duration::seconds(10));

        assert_eq!(record.config_blob, json!({"v": 2}));
        assert_eq!(record.updated_at, now);
        assert_eq!(record.created_at, now);
    }
}
