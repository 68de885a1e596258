//! Tag-addressable query cache.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::entry::{stale_at, CacheEntry, CacheSetOptions};
use super::freshness::{CacheLookup, Freshness};
use super::stats::{CacheCounters, CacheEntrySummary, CacheStats};
use crate::lock::{read_lock, write_lock};

/// Default capacity of the cache.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Tag to keys carrying it.
    tags: HashMap<String, HashSet<String>>,
}

impl CacheInner {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(entry)
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.remove(&entry.key);
        for tag in &entry.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Key of the entry that goes stale first.
    fn eviction_candidate(&self) -> Option<String> {
        self.entries
            .values()
            .min_by(|a, b| {
                a.stale_at
                    .cmp(&b.stale_at)
                    .then_with(|| a.cached_at.cmp(&b.cached_at))
                    .then_with(|| a.key.cmp(&b.key))
            })
            .map(|entry| entry.key.clone())
    }
}

/// In-memory cache of read-query results.
///
/// Entries are addressed by exact key for lookups and by tag for bulk
/// invalidation. Invalidation is coarse: a write on a table drops every
/// entry tagged with it, related or not, so a fresh read never reflects a
/// state older than the last invalidating write.
#[derive(Debug)]
pub struct QueryCache {
    inner: RwLock<CacheInner>,
    counters: CacheCounters,
    max_entries: usize,
}

impl QueryCache {
    /// Create a cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            counters: CacheCounters::default(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up `key`.
    ///
    /// A stale entry is returned only under [`Freshness::AllowStale`];
    /// otherwise it reads as a miss with `is_stale` set. An entry that no
    /// longer deserializes as `T` is dropped and reads as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str, freshness: Freshness) -> CacheLookup<T> {
        let found = {
            let inner = read_lock(&self.inner, "cache.inner");
            inner.entries.get(key).map(|entry| {
                (
                    entry.value.clone(),
                    entry.is_stale_at(Utc::now()),
                    entry.cached_at,
                )
            })
        };

        let Some((value, is_stale, cached_at)) = found else {
            self.counters.record_miss();
            return CacheLookup::miss();
        };

        if is_stale && !freshness.allows_stale() {
            self.counters.record_miss();
            debug!(key = key, "Cache entry stale, treating as miss");
            return CacheLookup::stale_miss(cached_at);
        }

        match serde_json::from_value::<T>(value) {
            Ok(data) => {
                self.counters.record_hit(is_stale);
                CacheLookup::hit(data, is_stale, cached_at)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Cached value has an unexpected shape, dropping");
                self.remove_if_cached_at(key, cached_at);
                self.counters.record_miss();
                CacheLookup::miss()
            }
        }
    }

    /// Remove `key` only if it still holds the entry cached at `cached_at`,
    /// so a `set` racing with a failed read is kept.
    fn remove_if_cached_at(&self, key: &str, cached_at: DateTime<Utc>) -> bool {
        let mut inner = write_lock(&self.inner, "cache.inner");
        if inner.entries.get(key).map(|entry| entry.cached_at) != Some(cached_at) {
            return false;
        }
        inner.remove(key).is_some()
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// Values that fail to serialize are not cached.
    pub fn set<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T, options: CacheSetOptions) {
        let key = key.into();
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Value could not be serialized, not caching");
                return;
            }
        };
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            tags: options.tags,
            cached_at: now,
            stale_at: stale_at(now, options.ttl),
            query: options.query,
        };

        let mut inner = write_lock(&self.inner, "cache.inner");
        if !inner.entries.contains_key(&key) {
            while inner.entries.len() >= self.max_entries {
                let Some(victim) = inner.eviction_candidate() else {
                    break;
                };
                inner.remove(&victim);
                self.counters.record_eviction();
                debug!(key = %victim, "Evicted cache entry");
            }
        }
        inner.insert(entry);
        debug!(key = %key, ttl_ms = options.ttl.as_millis() as u64, "Cached query result");
    }

    /// Full entry for `key`, for diagnostics.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        read_lock(&self.inner, "cache.inner").entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        read_lock(&self.inner, "cache.inner").entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        read_lock(&self.inner, "cache.inner").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn invalidate_key(&self, key: &str) -> bool {
        let removed = write_lock(&self.inner, "cache.inner").remove(key).is_some();
        if removed {
            debug!(key = key, "Invalidated cache entry");
        }
        removed
    }

    /// Remove every entry carrying `tag`. Returns the number removed.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.invalidate_by_tags(&[tag])
    }

    /// Remove every entry carrying any of `tags`. Returns the number removed.
    pub fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let mut inner = write_lock(&self.inner, "cache.inner");
        let keys: HashSet<String> = tags
            .iter()
            .filter_map(|tag| inner.tags.get(tag.as_ref()))
            .flat_map(|keys| keys.iter().cloned())
            .collect();
        let removed = keys
            .iter()
            .filter(|key| inner.remove(key).is_some())
            .count();
        drop(inner);

        if removed > 0 {
            let tags: Vec<&str> = tags.iter().map(AsRef::as_ref).collect();
            debug!(tags = ?tags, removed, "Invalidated cache entries by tag");
        }
        removed
    }

    /// Drop entries that have been stale for longer than `grace`.
    pub fn prune_stale(&self, grace: Duration) -> usize {
        let now = Utc::now();
        let mut inner = write_lock(&self.inner, "cache.inner");
        let expired: Vec<String> = inner
            .entries
            .values()
            .filter(|entry| entry.is_stale_at(now) && entry.stale_for(now) >= grace)
            .map(|entry| entry.key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "Pruned stale cache entries");
        }
        expired.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = write_lock(&self.inner, "cache.inner");
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.tags.clear();
        debug!(removed, "Cleared query cache");
    }

    pub fn get_stats(&self) -> CacheStats {
        let now = Utc::now();
        let inner = read_lock(&self.inner, "cache.inner");
        let mut entries: Vec<CacheEntrySummary> = inner
            .entries
            .values()
            .map(|entry| CacheEntrySummary {
                key: entry.key.clone(),
                remaining_ttl: entry
                    .stale_at
                    .signed_duration_since(now)
                    .to_std()
                    .unwrap_or(Duration::ZERO),
                is_stale: entry.is_stale_at(now),
                tags: entry.tags.iter().cloned().collect(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            entry_count: inner.entries.len(),
            tag_count: inner.tags.len(),
            entries,
            ..self.counters.snapshot()
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
