//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Reads that returned data.
    pub hits: u64,
    /// Reads that returned nothing.
    pub misses: u64,
    /// Hits served from a stale entry.
    pub stale_hits: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries currently in cache.
    pub entry_count: usize,
    /// Distinct tags currently indexed.
    pub tag_count: usize,
    /// Per-entry summary, ordered by key.
    pub entries: Vec<CacheEntrySummary>,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Diagnostic view of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntrySummary {
    pub key: String,
    pub remaining_ttl: Duration,
    pub is_stale: bool,
    pub tags: Vec<String>,
}

/// Lock-free counters backing [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn record_hit(&self, stale: bool) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if stale {
            self.stale_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters into a fresh [`CacheStats`].
    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}
