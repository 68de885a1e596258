//! Wellness Test Utilities
//!
//! Shared test infrastructure for the wellness workspace:
//! - Proptest generators for records, ids, filters and changes
//! - Fixtures for common scenarios
//! - Assertions over the error taxonomy

pub use wellness_core::{
    CacheSettings, Category, ConfigError, Entry, Goal, GoalPeriod, LedgerSettings, Record,
    RecordId, RemoteError, Table, Timestamp, ValidationError, WellnessConfig, WellnessError,
    WellnessResult, TEMP_ID_PREFIX,
};

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for wellness records and data-layer inputs.

    use super::*;
    use proptest::prelude::*;

    // === Identity ===

    /// Generate a server-assigned id (never temporary).
    pub fn arb_real_id() -> impl Strategy<Value = RecordId> {
        any::<[u8; 16]>().prop_map(|bytes| RecordId::from(Uuid::from_bytes(bytes)))
    }

    /// Generate a client-side temporary id.
    pub fn arb_temp_id() -> impl Strategy<Value = RecordId> {
        "[a-z0-9]{12}".prop_map(|suffix| RecordId::new(format!("{}{}", TEMP_ID_PREFIX, suffix)))
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    pub fn arb_user_id() -> impl Strategy<Value = String> {
        "u[0-9]{1,3}"
    }

    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z ]{0,23}"
    }

    /// Whole-number measurements, exact through JSON.
    pub fn arb_value() -> impl Strategy<Value = f64> {
        (0u32..10_000).prop_map(f64::from)
    }

    // === Enums ===

    pub fn arb_table() -> impl Strategy<Value = Table> {
        prop_oneof![
            Just(Table::Entries),
            Just(Table::Categories),
            Just(Table::Goals),
        ]
    }

    pub fn arb_goal_period() -> impl Strategy<Value = GoalPeriod> {
        prop_oneof![
            Just(GoalPeriod::Daily),
            Just(GoalPeriod::Weekly),
            Just(GoalPeriod::Monthly),
        ]
    }

    // === Records ===

    /// Generate an Entry with the given id.
    pub fn arb_entry_with_id(id: RecordId) -> impl Strategy<Value = Entry> {
        (
            arb_user_id(),
            prop::option::of(arb_real_id()),
            prop::option::of(arb_real_id()),
            arb_title(),
            prop::option::of(arb_value()),
            prop::option::of("[a-z ]{0,40}"),
            arb_timestamp(),
            arb_timestamp(),
        )
            .prop_map(
                move |(user_id, category_id, goal_id, title, value, notes, occurred_at, created_at)| {
                    Entry {
                        id: id.clone(),
                        user_id,
                        category_id,
                        goal_id,
                        title,
                        value,
                        notes,
                        occurred_at,
                        created_at,
                    }
                },
            )
    }

    /// Generate an Entry with a real id.
    pub fn arb_entry() -> impl Strategy<Value = Entry> {
        arb_real_id().prop_flat_map(arb_entry_with_id)
    }

    /// Generate an Entry not yet stored (temporary id).
    pub fn arb_new_entry() -> impl Strategy<Value = Entry> {
        arb_temp_id().prop_flat_map(arb_entry_with_id)
    }

    /// Generate up to `max` entries with pairwise distinct real ids.
    pub fn arb_unique_entries(max: usize) -> impl Strategy<Value = Vec<Entry>> {
        prop::collection::btree_set("[a-z0-9]{8}", 0..=max).prop_flat_map(|ids| {
            ids.into_iter()
                .map(|id| arb_entry_with_id(RecordId::new(id)))
                .collect::<Vec<_>>()
        })
    }

    pub fn arb_category() -> impl Strategy<Value = Category> {
        (
            arb_real_id(),
            arb_user_id(),
            arb_title(),
            prop::option::of("#[0-9a-f]{6}"),
            prop::option::of("[a-z]{3,10}"),
            arb_timestamp(),
        )
            .prop_map(|(id, user_id, name, color, icon, created_at)| Category {
                id,
                user_id,
                name,
                color,
                icon,
                created_at,
            })
    }

    pub fn arb_goal() -> impl Strategy<Value = Goal> {
        (
            arb_real_id(),
            arb_user_id(),
            prop::option::of(arb_real_id()),
            arb_title(),
            arb_value(),
            "[a-z]{1,8}",
            arb_goal_period(),
            any::<bool>(),
            arb_timestamp(),
        )
            .prop_map(
                |(id, user_id, category_id, title, target_value, unit, period, is_active, created_at)| {
                    Goal {
                        id,
                        user_id,
                        category_id,
                        title,
                        target_value,
                        unit,
                        period,
                        is_active,
                        created_at,
                    }
                },
            )
    }

    // === Data-layer inputs ===

    /// Generate a partial change set that still deserializes as an Entry.
    pub fn arb_entry_changes() -> impl Strategy<Value = Map<String, Value>> {
        (
            prop::option::of(arb_title()),
            prop::option::of(prop::option::of("[a-z ]{0,40}")),
            prop::option::of(prop::option::of(arb_value())),
        )
            .prop_map(|(title, notes, value)| {
                let mut changes = Map::new();
                if let Some(title) = title {
                    changes.insert("title".to_string(), Value::String(title));
                }
                if let Some(notes) = notes {
                    changes.insert("notes".to_string(), notes.map_or(Value::Null, Value::String));
                }
                if let Some(value) = value {
                    changes.insert("value".to_string(), value.map_or(Value::Null, Value::from));
                }
                changes
            })
    }

    /// Generate equality filters over common columns.
    pub fn arb_filters() -> impl Strategy<Value = BTreeMap<String, Value>> {
        prop::collection::btree_map(
            prop_oneof![
                Just("user_id".to_string()),
                Just("category_id".to_string()),
                Just("is_active".to_string()),
            ],
            prop_oneof![
                "u[0-9]{1,3}".prop_map(Value::String),
                any::<bool>().prop_map(Value::Bool),
                Just(Value::Null),
            ],
            0..3,
        )
    }

    /// Generate a cache tag: a table name or a user scope.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        prop_oneof![
            arb_table().prop_map(|table| table.as_str().to_string()),
            arb_user_id().prop_map(|user| format!("user:{}", user)),
        ]
    }

    /// Generate a TTL between 1ms and 10 minutes.
    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        (1u64..600_000).prop_map(Duration::from_millis)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and configs for common scenarios.

    use super::*;

    /// A small-capacity config for eviction tests.
    pub fn small_cache_config(max_entries: usize) -> WellnessConfig {
        WellnessConfig {
            cache: CacheSettings {
                max_entries,
                ..CacheSettings::default()
            },
            ledger: LedgerSettings::default(),
        }
    }

    /// A stored entry with the given id.
    pub fn entry(id: &str, title: &str) -> Entry {
        let now = Utc::now();
        Entry {
            id: RecordId::new(id),
            user_id: "u1".to_string(),
            category_id: None,
            goal_id: None,
            title: title.to_string(),
            value: Some(1.0),
            notes: None,
            occurred_at: now,
            created_at: now,
        }
    }

    /// An entry not yet stored, carrying a temporary id.
    pub fn new_entry(title: &str) -> Entry {
        Entry {
            id: RecordId::temporary(),
            ..entry("", title)
        }
    }

    pub fn category(id: &str, name: &str) -> Category {
        Category {
            id: RecordId::new(id),
            user_id: "u1".to_string(),
            name: name.to_string(),
            color: Some("#4caf50".to_string()),
            icon: None,
            created_at: Utc::now(),
        }
    }

    pub fn goal(id: &str, title: &str) -> Goal {
        Goal {
            id: RecordId::new(id),
            user_id: "u1".to_string(),
            category_id: None,
            title: title.to_string(),
            target_value: 10.0,
            unit: "km".to_string(),
            period: GoalPeriod::Weekly,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// `record` as a JSON row.
    pub fn row<T: Record>(record: &T) -> Value {
        serde_json::to_value(record).unwrap_or(Value::Null)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `WellnessResult`.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &WellnessResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_remote_error<T: std::fmt::Debug>(result: &WellnessResult<T>) {
        match result {
            Err(WellnessError::Remote(_)) => {}
            other => panic!("Expected Remote error, got: {:?}", other),
        }
    }

    /// Assert that a result is a NotFound remote error for `table`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &WellnessResult<T>, table: Table) {
        match result {
            Err(WellnessError::Remote(RemoteError::NotFound { table: t, .. })) => {
                assert_eq!(*t, table, "Wrong table in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", table, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &WellnessResult<T>) {
        match result {
            Err(WellnessError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }
}
