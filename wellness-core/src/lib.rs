//! Wellness Core - Entity Types
//!
//! Pure data structures shared by the client data layer: record identity,
//! the logical tables, entity records, the error taxonomy and configuration.
//! This crate contains no caching or ledger behavior.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use config::{CacheSettings, LedgerSettings, WellnessConfig};
pub use entities::{Category, Entry, Goal, Record};
pub use enums::{GoalPeriod, Table};
pub use error::{
    ConfigError, RemoteError, ValidationError, WellnessError, WellnessResult,
};
pub use identity::{RecordId, Timestamp, TEMP_ID_PREFIX};
