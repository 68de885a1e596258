//! Cache entries and write options.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use wellness_core::Table;

use crate::query::QueryDescriptor;

/// Default TTL for cached reads (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A cached query result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub tags: BTreeSet<String>,
    pub cached_at: DateTime<Utc>,
    pub stale_at: DateTime<Utc>,
    /// Query that produced the value, kept for diagnostics.
    pub query: Option<QueryDescriptor>,
}

impl CacheEntry {
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.stale_at
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    /// Time left before the entry goes stale; zero once stale.
    pub fn remaining_ttl(&self) -> Duration {
        self.stale_at
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// How long the entry has been stale; zero while fresh.
    pub fn stale_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stale_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Absolute instant `ttl` after `from`, saturating far in the future.
pub(crate) fn stale_at(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Options for [`QueryCache::set`](super::QueryCache::set).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSetOptions {
    pub ttl: Duration,
    pub tags: BTreeSet<String>,
    pub query: Option<QueryDescriptor>,
}

impl Default for CacheSetOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            tags: BTreeSet::new(),
            query: None,
        }
    }
}

impl CacheSetOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Options for caching the result of `query`, tagged with its table.
    pub fn for_query(query: &QueryDescriptor, ttl: Duration) -> Self {
        Self::new(ttl)
            .with_table(query.table)
            .with_query(query.clone())
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_table(self, table: Table) -> Self {
        self.with_tag(table.tag())
    }

    pub fn with_query(mut self, query: QueryDescriptor) -> Self {
        self.query = Some(query);
        self
    }
}
