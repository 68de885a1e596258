//! Core entity structures

use crate::{GoalPeriod, RecordId, Table, Timestamp};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A row stored in one of the remote tables.
///
/// Implementors serialize to a JSON object carrying an `id` field, which is
/// how the ledger and the remote source address them.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table the record lives in.
    const TABLE: Table;

    /// Identifier of this row (temporary or real).
    fn record_id(&self) -> &RecordId;
}

/// Category - user-defined grouping of wellness activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Category {
    pub id: RecordId,
    pub user_id: String,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// Goal - a target to reach within a period, optionally tied to a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Goal {
    pub id: RecordId,
    pub user_id: String,
    pub category_id: Option<RecordId>,
    pub title: String,
    pub target_value: f64,
    pub unit: String,
    pub period: GoalPeriod,
    pub is_active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// Entry - a single logged activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Entry {
    pub id: RecordId,
    pub user_id: String,
    pub category_id: Option<RecordId>,
    pub goal_id: Option<RecordId>,
    pub title: String,
    pub value: Option<f64>,
    pub notes: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub occurred_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Record for Category {
    const TABLE: Table = Table::Categories;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Record for Goal {
    const TABLE: Table = Table::Goals;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Record for Entry {
    const TABLE: Table = Table::Entries;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}
