//! Remote data source abstraction.
//!
//! The ledger and cache never talk to the database themselves; callers
//! reach it through [`RemoteDataSource`]. How the source is reached (REST,
//! RPC, SQL) is up to the implementation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use wellness_core::{RecordId, RemoteError, Table, WellnessResult};

use crate::lock::{read_lock, write_lock};
use crate::query::{matches_filters, Filters, QueryDescriptor};

/// Narrow CRUD interface to the remote store. Rows are JSON objects with an
/// `id` field.
#[async_trait]
pub trait RemoteDataSource: Send + Sync {
    /// Rows matching `query`.
    async fn select(&self, query: &QueryDescriptor) -> WellnessResult<Vec<Value>>;

    /// Insert `rows` and return them as stored, with real ids.
    async fn insert(&self, table: Table, rows: Vec<Value>) -> WellnessResult<Vec<Value>>;

    /// Apply `changes` to every row matching `filters`; returns updated rows.
    async fn update(
        &self,
        table: Table,
        changes: &Map<String, Value>,
        filters: &Filters,
    ) -> WellnessResult<Vec<Value>>;

    /// Delete every row matching `filters`; returns deleted rows.
    async fn delete(&self, table: Table, filters: &Filters) -> WellnessResult<Vec<Value>>;
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// In-memory remote source for tests and local development.
///
/// Supports equality filters, ordering, limit, column projection and
/// single-row reads. Inserted rows without a real id are assigned one.
/// Reads and writes can be switched to fail for exercising rollback paths.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    select_calls: AtomicUsize,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `table`.
    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        write_lock(&self.tables, "remote.tables").insert(table, rows);
    }

    /// All rows of `table`, in insertion order.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        read_lock(&self.tables, "remote.tables")
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `select` calls served so far.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        write_lock(&self.tables, "remote.tables").clear();
    }

    fn check_writes(&self, table: Table) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::RequestFailed {
                table,
                reason: "writes disabled".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteDataSource for InMemoryDataSource {
    async fn select(&self, query: &QueryDescriptor) -> WellnessResult<Vec<Value>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RemoteError::RequestFailed {
                table: query.table,
                reason: "reads disabled".to_string(),
            }
            .into());
        }

        let mut rows: Vec<Value> = read_lock(&self.tables, "remote.tables")
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(columns) = &query.columns {
            rows = rows.into_iter().map(|row| project(row, columns)).collect();
        }
        if query.single && rows.len() != 1 {
            return Err(RemoteError::NotSingle {
                table: query.table,
                count: rows.len(),
            }
            .into());
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> WellnessResult<Vec<Value>> {
        self.check_writes(table)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut object) = row else {
                return Err(RemoteError::MalformedRow {
                    table,
                    reason: "row is not an object".to_string(),
                }
                .into());
            };
            let needs_id = match object.get("id") {
                Some(Value::String(id)) => RecordId::new(id.as_str()).is_temporary(),
                Some(Value::Null) | None => true,
                Some(_) => false,
            };
            if needs_id {
                object.insert("id".to_string(), Value::String(RecordId::generate().into_string()));
            }
            stored.push(Value::Object(object));
        }

        let mut tables = write_lock(&self.tables, "remote.tables");
        let existing = tables.entry(table).or_default();
        for row in &stored {
            if existing.iter().any(|other| other.get("id") == row.get("id")) {
                return Err(RemoteError::Rejected {
                    table,
                    reason: format!("duplicate id {}", row.get("id").unwrap_or(&Value::Null)),
                }
                .into());
            }
        }
        existing.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(
        &self,
        table: Table,
        changes: &Map<String, Value>,
        filters: &Filters,
    ) -> WellnessResult<Vec<Value>> {
        self.check_writes(table)?;
        if changes.contains_key("id") {
            return Err(RemoteError::Rejected {
                table,
                reason: "id cannot be changed".to_string(),
            }
            .into());
        }

        let mut tables = write_lock(&self.tables, "remote.tables");
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|row| matches_filters(filters, row)) {
                if let Value::Object(object) = row {
                    for (field, value) in changes {
                        object.insert(field.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &Filters) -> WellnessResult<Vec<Value>> {
        self.check_writes(table)?;

        let mut tables = write_lock(&self.tables, "remote.tables");
        let mut deleted = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            let (removed, kept): (Vec<Value>, Vec<Value>) = rows
                .drain(..)
                .partition(|row| matches_filters(filters, row));
            *rows = kept;
            deleted = removed;
        }
        Ok(deleted)
    }
}

/// Order JSON values: nulls first, then booleans, numbers, strings; other
/// kinds compare equal.
fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn project(row: Value, columns: &[String]) -> Value {
    match row {
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .filter(|(field, _)| columns.iter().any(|column| column == field))
                .collect(),
        ),
        other => other,
    }
}
