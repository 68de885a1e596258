//! Configuration loading for the wellness client data layer.
//!
//! Every section field is required unless explicitly marked optional.

use crate::error::ConfigError;
use crate::Table;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WELLNESS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WellnessConfig {
    pub cache: CacheSettings,
    pub ledger: LedgerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// TTL applied to cached reads when no per-table override exists.
    pub default_ttl_ms: u64,
    /// Upper bound on cached queries.
    pub max_entries: usize,
    /// How long an entry may stay stale before pruning drops it.
    pub stale_grace_ms: u64,
    /// Per-table TTL overrides, keyed by table name.
    #[serde(default)]
    pub table_ttl_ms: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSettings {
    /// Buffer size of the ledger broadcast channel.
    pub event_channel_capacity: usize,
    /// Age after which abandoned ledger entries are pruned.
    pub max_entry_age_ms: u64,
}

impl WellnessConfig {
    /// Load from the path in `WELLNESS_CONFIG`, falling back to defaults
    /// when the variable is unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_path(&PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: WellnessConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_entries",
                reason: "must be > 0".to_string(),
            });
        }
        for name in self.cache.table_ttl_ms.keys() {
            if name.parse::<Table>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.table_ttl_ms",
                    reason: format!("unknown table '{}'", name),
                });
            }
        }
        if self.ledger.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ledger.event_channel_capacity",
                reason: "must be > 0".to_string(),
            });
        }
        if self.ledger.max_entry_age_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ledger.max_entry_age_ms",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_millis(self.stale_grace_ms)
    }

    /// TTL for reads against `table`, honoring overrides.
    pub fn ttl_for(&self, table: Table) -> Duration {
        self.table_ttl_ms
            .get(table.as_str())
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or_else(|| self.default_ttl())
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60 * 1000,
            max_entries: 500,
            stale_grace_ms: 10 * 60 * 1000,
            table_ttl_ms: BTreeMap::new(),
        }
    }
}

impl LedgerSettings {
    pub fn max_entry_age(&self) -> Duration {
        Duration::from_millis(self.max_entry_age_ms)
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
            max_entry_age_ms: 60 * 60 * 1000,
        }
    }
}
