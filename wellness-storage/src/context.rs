//! Shared application state for the data layer.

use std::sync::Arc;
use tracing::info;
use wellness_core::{ConfigError, WellnessConfig};

use crate::cache::QueryCache;
use crate::client::DataClient;
use crate::optimistic::OptimisticLedger;
use crate::remote::RemoteDataSource;

/// Owns the ledger, the cache and the configuration.
///
/// Built once at start-up and cloned (cheaply) into whatever needs it. A
/// fresh context gives fully isolated state.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: Arc<WellnessConfig>,
    ledger: Arc<OptimisticLedger>,
    cache: Arc<QueryCache>,
}

/// Counts removed by [`AppContext::maintenance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub ledger_entries_pruned: usize,
    pub cache_entries_pruned: usize,
}

impl AppContext {
    pub fn new(config: WellnessConfig) -> Self {
        let ledger = OptimisticLedger::new(config.ledger.event_channel_capacity);
        let cache = QueryCache::new(config.cache.max_entries);
        Self {
            config: Arc::new(config),
            ledger: Arc::new(ledger),
            cache: Arc::new(cache),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(WellnessConfig::default())
    }

    /// Build from [`WellnessConfig::load`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(WellnessConfig::load()?))
    }

    pub fn config(&self) -> &WellnessConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<OptimisticLedger> {
        &self.ledger
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// A data client over `remote` sharing this context's state.
    pub fn client<R: RemoteDataSource>(&self, remote: Arc<R>) -> DataClient<R> {
        DataClient::new(
            remote,
            Arc::clone(&self.ledger),
            Arc::clone(&self.cache),
            Arc::clone(&self.config),
        )
    }

    /// Drop all ledger entries and cached queries, e.g. on logout.
    pub fn reset(&self) {
        let removed = self.ledger.clear();
        self.cache.clear();
        info!(ledger_entries = removed, "Data layer reset");
    }

    /// Prune abandoned ledger entries and long-stale cache entries.
    pub fn maintenance(&self) -> MaintenanceReport {
        let report = MaintenanceReport {
            ledger_entries_pruned: self
                .ledger
                .prune_older_than(self.config.ledger.max_entry_age()),
            cache_entries_pruned: self.cache.prune_stale(self.config.cache.stale_grace()),
        };
        if report != MaintenanceReport::default() {
            info!(
                ledger = report.ledger_entries_pruned,
                cache = report.cache_entries_pruned,
                "Data layer maintenance pruned entries"
            );
        }
        report
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}
