//! Data client composing the remote source, the query cache and the
//! optimistic ledger.
//!
//! Reads go through the cache. Writes are registered in the ledger first,
//! sent to the remote source, then confirmed (and the table's cache tag
//! invalidated) or marked failed.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wellness_core::{
    Record, RecordId, RemoteError, Table, WellnessConfig, WellnessError, WellnessResult,
};

use crate::cache::{CacheSetOptions, Freshness, QueryCache};
use crate::optimistic::OptimisticLedger;
use crate::query::{Filters, QueryDescriptor};
use crate::remote::RemoteDataSource;

/// Per-read caching options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    pub freshness: Freshness,
    /// Tags added on top of the table tag.
    pub tags: BTreeSet<String>,
    /// Overrides the configured TTL for the table.
    pub ttl: Option<Duration>,
    /// Skip the cache entirely and do not populate it.
    pub bypass_cache: bool,
}

impl ReadOptions {
    pub fn allow_stale() -> Self {
        Self {
            freshness: Freshness::AllowStale,
            ..Self::default()
        }
    }

    pub fn bypass() -> Self {
        Self {
            bypass_cache: true,
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Client-side data access for UI code.
pub struct DataClient<R: RemoteDataSource> {
    remote: Arc<R>,
    ledger: Arc<OptimisticLedger>,
    cache: Arc<QueryCache>,
    config: Arc<WellnessConfig>,
}

impl<R: RemoteDataSource> DataClient<R> {
    pub fn new(
        remote: Arc<R>,
        ledger: Arc<OptimisticLedger>,
        cache: Arc<QueryCache>,
        config: Arc<WellnessConfig>,
    ) -> Self {
        Self {
            remote,
            ledger,
            cache,
            config,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn ledger(&self) -> &OptimisticLedger {
        &self.ledger
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Run `query` through the cache.
    ///
    /// A usable cache entry is returned as is; otherwise the remote source
    /// is queried and the rows, once decoded, cached under the table tag
    /// plus `options.tags`. Failures, including rows that do not decode as
    /// `T`, are returned and never cached.
    pub async fn select<T>(&self, query: &QueryDescriptor, options: &ReadOptions) -> WellnessResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        if options.bypass_cache {
            return decode_rows(query.table, self.remote.select(query).await?);
        }

        let key = query.cache_key();
        let lookup = self.cache.get::<Vec<T>>(&key, options.freshness);
        if let Some(rows) = lookup.data {
            debug!(key = %key, stale = lookup.is_stale, "Served query from cache");
            return Ok(rows);
        }

        let rows: Vec<T> = decode_rows(query.table, self.remote.select(query).await?)?;
        let ttl = options
            .ttl
            .unwrap_or_else(|| self.config.cache.ttl_for(query.table));
        let set_options = CacheSetOptions::for_query(query, ttl).with_tags(options.tags.iter().cloned());
        self.cache.set(key, &rows, set_options);
        Ok(rows)
    }

    /// Single row by id, through the cache.
    pub async fn get_by_id<T: Record>(&self, id: &RecordId, options: &ReadOptions) -> WellnessResult<T> {
        let query = QueryDescriptor::by_id(T::TABLE, id);
        let mut rows: Vec<T> = self.select(&query, options).await?;
        match rows.pop() {
            Some(row) if rows.is_empty() => Ok(row),
            _ => Err(RemoteError::NotFound {
                table: T::TABLE,
                id: id.clone(),
            }
            .into()),
        }
    }

    /// Rows for display: `select` with pending ledger entries overlaid.
    pub async fn list<T: Record>(&self, query: &QueryDescriptor, options: &ReadOptions) -> WellnessResult<Vec<T>> {
        let rows: Vec<T> = self.select(query, options).await?;
        Ok(self.ledger.apply_updates(query.table, &rows))
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert `entity`, which carries a temporary id, and return the stored
    /// row with its real id.
    pub async fn insert<T: Record>(&self, entity: &T) -> WellnessResult<T> {
        let table = T::TABLE;
        let temp_id = entity.record_id().clone();
        let row = serde_json::to_value(entity)?;
        self.ledger.create_optimistic_insert(table, &row);

        let stored = match self.remote.insert(table, vec![row]).await {
            Ok(mut rows) if rows.len() == 1 => rows.remove(0),
            Ok(rows) => {
                let err = RemoteError::Rejected {
                    table,
                    reason: format!("expected 1 inserted row, got {}", rows.len()),
                };
                self.ledger.fail_update_in(table, &temp_id, err.to_string());
                return Err(err.into());
            }
            Err(e) => {
                self.ledger.fail_update_in(table, &temp_id, e.to_string());
                return Err(e);
            }
        };

        self.ledger.confirm_update_in(table, &temp_id, Some(&stored));
        self.invalidate_table(table);
        Ok(serde_json::from_value(stored)?)
    }

    /// Apply `changes` to the row `id`. `original` is kept for rollback.
    pub async fn update<T: Record>(
        &self,
        id: &RecordId,
        changes: Map<String, Value>,
        original: Option<&T>,
    ) -> WellnessResult<T> {
        let table = T::TABLE;
        let original = original.map(serde_json::to_value).transpose()?;
        self.ledger
            .create_optimistic_update(table, id.clone(), changes.clone(), original);

        let result = self.remote.update(table, &changes, &id_filter(id)).await;
        let row = match result {
            Ok(mut rows) if !rows.is_empty() => rows.remove(0),
            Ok(_) => {
                let err = RemoteError::NotFound {
                    table,
                    id: id.clone(),
                };
                self.ledger.fail_update_in(table, id, err.to_string());
                return Err(err.into());
            }
            Err(e) => {
                self.ledger.fail_update_in(table, id, e.to_string());
                return Err(e);
            }
        };

        self.ledger.confirm_update_in(table, id, Some(&row));
        self.invalidate_table(table);
        Ok(serde_json::from_value(row)?)
    }

    /// Delete the row `id`. `original` is kept for rollback.
    pub async fn delete<T: Record>(&self, id: &RecordId, original: Option<&T>) -> WellnessResult<()> {
        let table = T::TABLE;
        let original = original.map(serde_json::to_value).transpose()?;
        self.ledger.create_optimistic_delete(table, id.clone(), original);

        match self.remote.delete(table, &id_filter(id)).await {
            Ok(rows) => {
                if rows.is_empty() {
                    // Already gone remotely; the outcome the caller wanted.
                    debug!(table = %table, id = %id, "Delete matched no rows");
                }
                self.ledger.confirm_update_in(table, id, None);
                self.invalidate_table(table);
                Ok(())
            }
            Err(e) => {
                self.ledger.fail_update_in(table, id, e.to_string());
                Err(e)
            }
        }
    }

    /// Drop every cached query against `table`.
    pub fn invalidate_table(&self, table: Table) -> usize {
        self.cache.invalidate_by_tag(table.as_str())
    }
}

impl<R: RemoteDataSource> Clone for DataClient<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            ledger: Arc::clone(&self.ledger),
            cache: Arc::clone(&self.cache),
            config: Arc::clone(&self.config),
        }
    }
}

fn id_filter(id: &RecordId) -> Filters {
    let mut filters = Filters::new();
    filters.insert("id".to_string(), Value::String(id.to_string()));
    filters
}

fn decode_rows<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> WellnessResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                warn!(table = %table, error = %e, "Remote row does not match the record type");
                WellnessError::from(RemoteError::MalformedRow {
                    table,
                    reason: e.to_string(),
                })
            })
        })
        .collect()
}
