//! Enum types for wellness records

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical collection in the remote data source.
///
/// The string form is both the remote table name and the default cache
/// invalidation tag for queries against that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Table {
    Entries,
    Categories,
    Goals,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Entries, Table::Categories, Table::Goals];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Entries => "entries",
            Table::Categories => "categories",
            Table::Goals => "goals",
        }
    }

    /// Cache tag covering every query against this table.
    pub fn tag(&self) -> String {
        self.as_str().to_string()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entries" => Ok(Table::Entries),
            "categories" => Ok(Table::Categories),
            "goals" => Ok(Table::Goals),
            other => Err(ValidationError::UnknownTable {
                name: other.to_string(),
            }),
        }
    }
}

/// Period over which a goal target is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum GoalPeriod {
    Daily,
    Weekly,
    Monthly,
}
