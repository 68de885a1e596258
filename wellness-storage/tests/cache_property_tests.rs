//! Property-Based Tests for the Query Cache and Data Client
//!
//! Key derivation is deterministic and sensitive to every descriptor field,
//! tag invalidation removes exactly the tagged entries, and client writes
//! invalidate their table on success but leave the cache alone on failure.

use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Runtime;
use wellness_storage::{
    AppContext, CacheSetOptions, InMemoryDataSource, OrderBy, QueryDescriptor, ReadOptions,
};
use wellness_test_utils::generators::{
    arb_entry_changes, arb_filters, arb_new_entry, arb_table, arb_tag, arb_ttl,
    arb_unique_entries,
};
use wellness_test_utils::{fixtures, Entry, Table};

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

fn column_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("id".to_string()),
        Just("title".to_string()),
        Just("created_at".to_string()),
        "[a-z_]{2,10}",
    ]
}

fn descriptor_strategy() -> impl Strategy<Value = QueryDescriptor> {
    (
        arb_table(),
        prop::option::of(prop::collection::vec(column_strategy(), 0..4)),
        arb_filters(),
        prop::option::of((column_strategy(), any::<bool>())),
        prop::option::of(0usize..100),
        any::<bool>(),
    )
        .prop_map(|(table, columns, filters, order, limit, single)| QueryDescriptor {
            table,
            columns,
            filters,
            order: order.map(|(column, ascending)| OrderBy { column, ascending }),
            limit,
            single,
        })
}

/// Which descriptor field to change.
#[derive(Debug, Clone, Copy)]
enum Field {
    Table,
    Columns,
    Filters,
    Order,
    Limit,
    Single,
}

fn field_strategy() -> impl Strategy<Value = Field> {
    prop_oneof![
        Just(Field::Table),
        Just(Field::Columns),
        Just(Field::Filters),
        Just(Field::Order),
        Just(Field::Limit),
        Just(Field::Single),
    ]
}

/// `query` with exactly one field changed to a different value.
fn perturb(query: &QueryDescriptor, field: Field) -> QueryDescriptor {
    let mut changed = query.clone();
    match field {
        Field::Table => {
            let position = Table::ALL.iter().position(|t| *t == query.table).unwrap_or(0);
            changed.table = Table::ALL[(position + 1) % Table::ALL.len()];
        }
        Field::Columns => {
            changed.columns = match &query.columns {
                None => Some(Vec::new()),
                Some(columns) => {
                    let mut columns = columns.clone();
                    columns.push("extra_column".to_string());
                    Some(columns)
                }
            };
        }
        Field::Filters => {
            changed
                .filters
                .insert("zz_extra_filter".to_string(), Value::Bool(true));
        }
        Field::Order => {
            changed.order = match &query.order {
                None => Some(OrderBy::asc("created_at")),
                Some(order) => Some(OrderBy {
                    column: order.column.clone(),
                    ascending: !order.ascending,
                }),
            };
        }
        Field::Limit => {
            changed.limit = Some(query.limit.map_or(0, |n| n + 1));
        }
        Field::Single => {
            changed.single = !query.single;
        }
    }
    changed
}

// ============================================================================
// CACHE PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Identical descriptors share a key; changing any one field changes it.
    #[test]
    fn prop_cache_key_determinism(
        query in descriptor_strategy(),
        field in field_strategy(),
    ) {
        let copy = query.clone();
        prop_assert_eq!(query.cache_key(), copy.cache_key());

        let changed = perturb(&query, field);
        prop_assert_ne!(query.cache_key(), changed.cache_key());
    }

    /// Invalidating a tag removes exactly the entries carrying it.
    #[test]
    fn prop_tag_invalidation_is_exact(
        tag_sets in prop::collection::vec(prop::collection::btree_set(arb_tag(), 0..3), 1..12),
        target in arb_tag(),
        ttl in arb_ttl(),
    ) {
        let ctx = AppContext::with_defaults();
        let cache = ctx.cache();
        for (i, tags) in tag_sets.iter().enumerate() {
            let options = CacheSetOptions::new(ttl).with_tags(tags.iter().cloned());
            cache.set(format!("k{}", i), &i, options);
        }

        let tagged: BTreeSet<usize> = tag_sets
            .iter()
            .enumerate()
            .filter(|(_, tags)| tags.contains(&target))
            .map(|(i, _)| i)
            .collect();

        let removed = cache.invalidate_by_tags(&[target.as_str()]);
        prop_assert_eq!(removed, tagged.len());
        for i in 0..tag_sets.len() {
            prop_assert_eq!(cache.contains_key(&format!("k{}", i)), !tagged.contains(&i));
        }
    }
}

// ============================================================================
// DATA CLIENT PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// A successful insert invalidates every query on the table and leaves
    /// no ledger entry behind.
    #[test]
    fn prop_client_insert_invalidates_table(
        rows in arb_unique_entries(6),
        new_entry in arb_new_entry(),
        filter_sets in prop::collection::vec(arb_filters(), 1..4),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let ctx = AppContext::with_defaults();
            let remote = Arc::new(InMemoryDataSource::new());
            remote.seed(Table::Entries, rows.iter().map(fixtures::row).collect());
            let client = ctx.client(Arc::clone(&remote));

            for filters in &filter_sets {
                let mut query = QueryDescriptor::new(Table::Entries);
                query.filters = filters.clone();
                client
                    .select::<Value>(&query, &ReadOptions::default())
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            let goals = QueryDescriptor::new(Table::Goals);
            client
                .select::<Value>(&goals, &ReadOptions::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let stored = client
                .insert(&new_entry)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert!(!stored.id.is_temporary());
            prop_assert_eq!(ctx.cache().len(), 1);
            prop_assert!(ctx.cache().contains_key(&goals.cache_key()));
            prop_assert!(ctx.ledger().get(Table::Entries, &new_entry.id).is_none());
            prop_assert_eq!(ctx.ledger().get_stats().total(), 0);

            let listed: Vec<Entry> = client
                .list(&QueryDescriptor::new(Table::Entries), &ReadOptions::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(listed.len(), rows.len() + 1);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// A failed update keeps its snapshot in the ledger and does not touch
    /// the cache.
    #[test]
    fn prop_client_failed_update_keeps_snapshot(
        rows in arb_unique_entries(6),
        index in any::<prop::sample::Index>(),
        changes in arb_entry_changes(),
    ) {
        prop_assume!(!rows.is_empty());
        let original = index.get(&rows).clone();

        let rt = test_runtime()?;
        rt.block_on(async {
            let ctx = AppContext::with_defaults();
            let remote = Arc::new(InMemoryDataSource::new());
            remote.seed(Table::Entries, rows.iter().map(fixtures::row).collect());
            let client = ctx.client(Arc::clone(&remote));

            let query = QueryDescriptor::new(Table::Entries);
            let before: Vec<Entry> = client
                .select(&query, &ReadOptions::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            remote.set_fail_writes(true);
            let result = client.update::<Entry>(&original.id, changes, Some(&original)).await;
            prop_assert!(result.is_err());

            let entry = ctx
                .ledger()
                .get(Table::Entries, &original.id)
                .ok_or_else(|| TestCaseError::fail("missing ledger entry"))?;
            prop_assert!(entry.status.is_failed());
            prop_assert_eq!(entry.original_value(), Some(&fixtures::row(&original)));
            prop_assert!(ctx.cache().contains_key(&query.cache_key()));

            let listed: Vec<Entry> = client
                .list(&query, &ReadOptions::default())
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(listed, before);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
