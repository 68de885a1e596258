//! Freshness contracts for cache reads.
//!
//! Callers state whether they accept stale data, and every read reports
//! whether what it found was stale.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Staleness tolerance for a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// A stale entry counts as a miss.
    #[default]
    Fresh,

    /// A stale entry is returned, flagged with `is_stale`.
    ///
    /// Use this to render something immediately while a refetch runs
    /// (stale-while-revalidate).
    AllowStale,
}

impl Freshness {
    pub fn from_allow_stale(allow_stale: bool) -> Self {
        if allow_stale {
            Self::AllowStale
        } else {
            Self::Fresh
        }
    }

    pub fn allows_stale(&self) -> bool {
        matches!(self, Self::AllowStale)
    }
}

/// Result of a cache read.
///
/// `data` is `None` on a miss. `is_stale` is set whenever the entry found
/// was past its TTL, including when a [`Freshness::Fresh`] read turned it
/// into a miss.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup<T> {
    pub data: Option<T>,
    pub is_stale: bool,
    cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheLookup<T> {
    pub fn miss() -> Self {
        Self {
            data: None,
            is_stale: false,
            cached_at: None,
        }
    }

    /// A stale entry rejected by the caller's freshness requirement.
    pub fn stale_miss(cached_at: DateTime<Utc>) -> Self {
        Self {
            data: None,
            is_stale: true,
            cached_at: Some(cached_at),
        }
    }

    pub fn hit(data: T, is_stale: bool, cached_at: DateTime<Utc>) -> Self {
        Self {
            data: Some(data),
            is_stale,
            cached_at: Some(cached_at),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_miss(&self) -> bool {
        self.data.is_none()
    }

    /// When the entry was stored, if one was found.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.cached_at
    }

    /// Time since the entry was stored.
    pub fn age(&self) -> Option<Duration> {
        let cached_at = self.cached_at?;
        Some(
            Utc::now()
                .signed_duration_since(cached_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn map<U, F>(self, f: F) -> CacheLookup<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheLookup {
            data: self.data.map(f),
            is_stale: self.is_stale,
            cached_at: self.cached_at,
        }
    }
}
