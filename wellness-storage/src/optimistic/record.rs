//! Ledger record types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use wellness_core::{RecordId, Table, Timestamp};

/// Mutation registered against a record.
///
/// Each variant carries only the data that makes sense for it: a delete
/// has no new values, only the snapshot needed to restore the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum PendingOperation {
    Insert {
        entity: Value,
    },
    Update {
        changes: Map<String, Value>,
        original: Option<Value>,
    },
    Delete {
        original: Option<Value>,
    },
}

/// Discriminant of [`PendingOperation`], for display and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl PendingOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            PendingOperation::Insert { .. } => OperationKind::Insert,
            PendingOperation::Update { .. } => OperationKind::Update,
            PendingOperation::Delete { .. } => OperationKind::Delete,
        }
    }
}

/// Lifecycle of a ledger entry.
///
/// `Confirmed` is terminal and the entry leaves the ledger in the same
/// step, so only `Pending` and `Failed` entries are ever observed in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateStatus {
    Pending,
    Confirmed,
    Failed { error: String },
}

impl UpdateStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, UpdateStatus::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UpdateStatus::Failed { .. })
    }
}

/// One in-flight optimistic mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticUpdate {
    pub id: RecordId,
    pub table: Table,
    pub operation: PendingOperation,
    pub status: UpdateStatus,
    pub created_at: Timestamp,
}

impl OptimisticUpdate {
    pub(crate) fn pending(table: Table, id: RecordId, operation: PendingOperation) -> Self {
        Self {
            id,
            table,
            operation,
            status: UpdateStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Snapshot to restore if the mutation fails.
    pub fn original_value(&self) -> Option<&Value> {
        match &self.operation {
            PendingOperation::Insert { .. } => None,
            PendingOperation::Update { original, .. } | PendingOperation::Delete { original } => {
                original.as_ref()
            }
        }
    }

    /// Optimistic version of the entity.
    ///
    /// For inserts this is the entity itself. For updates it is the
    /// original snapshot with the changes applied, or just the changes when
    /// no snapshot was supplied. Deletes have no optimistic value.
    pub fn payload(&self) -> Option<Value> {
        match &self.operation {
            PendingOperation::Insert { entity } => Some(entity.clone()),
            PendingOperation::Update { changes, original } => {
                let mut merged = match original {
                    Some(Value::Object(object)) => object.clone(),
                    _ => Map::new(),
                };
                for (field, value) in changes {
                    merged.insert(field.clone(), value.clone());
                }
                Some(Value::Object(merged))
            }
            PendingOperation::Delete { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            UpdateStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Aggregate counts for diagnostics panels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Entries awaiting a server response.
    pub pending: usize,
    /// Entries whose mutation failed and still await rollback or retry.
    pub failed: usize,
    /// Mutations confirmed over the ledger's lifetime.
    pub confirmed: u64,
    /// Entries currently held, per table.
    pub by_table: BTreeMap<Table, usize>,
}

impl LedgerStats {
    pub fn total(&self) -> usize {
        self.pending + self.failed
    }
}

/// Notification emitted after every ledger mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    Created {
        table: Table,
        id: RecordId,
        kind: OperationKind,
        replaced: bool,
    },
    Confirmed {
        table: Table,
        id: RecordId,
        real_id: Option<RecordId>,
    },
    Failed {
        table: Table,
        id: RecordId,
        error: String,
    },
    Retried {
        table: Table,
        id: RecordId,
    },
    Discarded {
        table: Table,
        id: RecordId,
    },
    Pruned {
        removed: usize,
    },
    Cleared {
        removed: usize,
    },
}

impl LedgerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Created { .. } => "created",
            LedgerEvent::Confirmed { .. } => "confirmed",
            LedgerEvent::Failed { .. } => "failed",
            LedgerEvent::Retried { .. } => "retried",
            LedgerEvent::Discarded { .. } => "discarded",
            LedgerEvent::Pruned { .. } => "pruned",
            LedgerEvent::Cleared { .. } => "cleared",
        }
    }

    /// Table the event concerns, if it concerns a single record.
    pub fn table(&self) -> Option<Table> {
        match self {
            LedgerEvent::Created { table, .. }
            | LedgerEvent::Confirmed { table, .. }
            | LedgerEvent::Failed { table, .. }
            | LedgerEvent::Retried { table, .. }
            | LedgerEvent::Discarded { table, .. } => Some(*table),
            LedgerEvent::Pruned { .. } | LedgerEvent::Cleared { .. } => None,
        }
    }
}
