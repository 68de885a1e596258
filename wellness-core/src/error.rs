//! Error types for wellness client operations
//!
//! Cache misses, stale reads and ledger overwrites are normal outcomes and
//! have no variants here.

use crate::{RecordId, Table};
use thiserror::Error;

/// Errors reported by the remote data source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Request to {table} failed: {reason}")]
    RequestFailed { table: Table, reason: String },

    #[error("Record not found in {table}: {id}")]
    NotFound { table: Table, id: RecordId },

    #[error("Write to {table} rejected: {reason}")]
    Rejected { table: Table, reason: String },

    #[error("Expected a single row from {table}, got {count}")]
    NotSingle { table: Table, count: usize },

    #[error("Malformed row from {table}: {reason}")]
    MalformedRow { table: Table, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown table: {name}")]
    UnknownTable { name: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for the wellness client.
#[derive(Debug, Error)]
pub enum WellnessError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for wellness client operations.
pub type WellnessResult<T> = Result<T, WellnessError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_not_found() {
        let err = RemoteError::NotFound {
            table: Table::Entries,
            id: RecordId::from("real_42"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("not found"));
        assert!(msg.contains("entries"));
        assert!(msg.contains("real_42"));
    }

    #[test]
    fn test_remote_error_display_not_single() {
        let err = RemoteError::NotSingle {
            table: Table::Goals,
            count: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("goals"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "cache.max_entries",
            reason: "must be > 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cache.max_entries"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn test_wellness_error_from_variants() {
        let remote = WellnessError::from(RemoteError::RequestFailed {
            table: Table::Entries,
            reason: "timeout".to_string(),
        });
        assert!(matches!(remote, WellnessError::Remote(_)));

        let validation = WellnessError::from(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        });
        assert!(matches!(validation, WellnessError::Validation(_)));

        let config = WellnessError::from(ConfigError::InvalidValue {
            field: "ledger.event_channel_capacity",
            reason: "must be > 0".to_string(),
        });
        assert!(matches!(config, WellnessError::Config(_)));

        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(
            WellnessError::from(serde_err),
            WellnessError::Serialization(_)
        ));
    }
}
