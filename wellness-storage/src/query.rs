//! Query descriptors and cache key derivation.
//!
//! A [`QueryDescriptor`] captures the full shape of a read against the
//! remote data source. Two descriptors that describe the same logical query
//! always derive the same cache key; any differing field derives a
//! different one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use wellness_core::{RecordId, Table};

/// Equality filters keyed by column. Ordered so serialization is stable.
pub type Filters = BTreeMap<String, Value>;

/// Ordering clause of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Shape of a read query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub table: Table,
    /// Projected columns; `None` selects every column.
    pub columns: Option<Vec<String>>,
    pub filters: Filters,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    /// Expect exactly one row.
    pub single: bool,
}

impl QueryDescriptor {
    /// Select every row of `table`.
    pub fn new(table: Table) -> Self {
        Self {
            table,
            columns: None,
            filters: Filters::new(),
            order: None,
            limit: None,
            single: false,
        }
    }

    /// Select the row with the given id.
    pub fn by_id(table: Table, id: &RecordId) -> Self {
        Self::new(table).filter("id", id.as_str()).single()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Derive the cache key for this query.
    ///
    /// Format: `query:{table}|cols={json}|filter={json}|order={col}:{dir}|limit={n}|single={bool}`.
    /// JSON renderings keep column lists and filter values unambiguous.
    pub fn cache_key(&self) -> String {
        let columns = match &self.columns {
            Some(columns) => Value::from(columns.clone()).to_string(),
            None => "*".to_string(),
        };
        let filters: Map<String, Value> = self
            .filters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let order = match &self.order {
            Some(order) => format!(
                "{}:{}",
                Value::from(order.column.clone()),
                if order.ascending { "asc" } else { "desc" }
            ),
            None => "-".to_string(),
        };
        let limit = self
            .limit
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "query:{}|cols={}|filter={}|order={}|limit={}|single={}",
            self.table,
            columns,
            Value::Object(filters),
            order,
            limit,
            self.single
        )
    }

    /// Whether `row` satisfies every equality filter.
    pub fn matches(&self, row: &Value) -> bool {
        matches_filters(&self.filters, row)
    }
}

/// Whether `row` satisfies every equality filter in `filters`.
pub fn matches_filters(filters: &Filters, row: &Value) -> bool {
    filters
        .iter()
        .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
}
