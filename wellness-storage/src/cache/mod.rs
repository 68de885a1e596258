//! Query cache with explicit staleness and tag-based invalidation.
//!
//! Reads state their tolerance through [`Freshness`] and get back a
//! [`CacheLookup<T>`] that says whether the data was stale. Writes drop
//! whole tags (by default the table name) rather than individual rows.
//!
//! # Example
//!
//! ```ignore
//! let query = QueryDescriptor::new(Table::Entries).filter("user_id", user_id);
//! let key = query.cache_key();
//!
//! let lookup = cache.get::<Vec<Entry>>(&key, Freshness::AllowStale);
//! if lookup.is_miss() || lookup.is_stale {
//!     let rows = remote.select(&query).await?;
//!     cache.set(key, &rows, CacheSetOptions::for_query(&query, ttl));
//! }
//!
//! // After any write to the entries table:
//! cache.invalidate_by_tag(Table::Entries.as_str());
//! ```

pub mod entry;
pub mod freshness;
pub mod stats;
pub mod store;

pub use entry::{CacheEntry, CacheSetOptions, DEFAULT_TTL};
pub use freshness::{CacheLookup, Freshness};
pub use stats::{CacheEntrySummary, CacheStats};
pub use store::{QueryCache, DEFAULT_MAX_ENTRIES};
