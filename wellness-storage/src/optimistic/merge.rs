//! Pure overlay of pending ledger entries onto authoritative rows.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::record::{OptimisticUpdate, PendingOperation};

/// Extract the `id` field of a serialized row.
pub(crate) fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Overlay `entries` onto `rows`.
///
/// Only pending entries take part: updates replace fields of the matching
/// row, deletes drop the matching row, inserts are appended in creation
/// order unless a row with the same id already exists. Rows that cannot be
/// serialized or re-read after merging are passed through unchanged.
pub(crate) fn overlay<T>(entries: &[OptimisticUpdate], rows: &[T]) -> Vec<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    let by_id: HashMap<&str, &OptimisticUpdate> = entries
        .iter()
        .filter(|entry| entry.status.is_pending())
        .map(|entry| (entry.id.as_str(), entry))
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    let mut merged = Vec::with_capacity(rows.len() + by_id.len());

    for row in rows {
        let json = match serde_json::to_value(row) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Row could not be serialized for overlay");
                merged.push(row.clone());
                continue;
            }
        };
        let Some(id) = row_id(&json) else {
            merged.push(row.clone());
            continue;
        };
        seen.insert(id.clone());

        match by_id.get(id.as_str()).map(|entry| &entry.operation) {
            Some(PendingOperation::Delete { .. }) => {}
            Some(PendingOperation::Update { changes, .. }) => {
                merged.push(apply_changes(row, json, changes, &id));
            }
            // A pending insert whose id is already served is left to the server row.
            Some(PendingOperation::Insert { .. }) | None => merged.push(row.clone()),
        }
    }

    let mut inserts: Vec<&OptimisticUpdate> = by_id
        .values()
        .copied()
        .filter(|entry| matches!(entry.operation, PendingOperation::Insert { .. }))
        .filter(|entry| !seen.contains(entry.id.as_str()))
        .collect();
    inserts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    for entry in inserts {
        if let PendingOperation::Insert { entity } = &entry.operation {
            match serde_json::from_value::<T>(entity.clone()) {
                Ok(row) => merged.push(row),
                Err(e) => warn!(
                    table = %entry.table,
                    id = %entry.id,
                    error = %e,
                    "Pending insert does not match the row type, skipping"
                ),
            }
        }
    }

    merged
}

fn apply_changes<T>(
    row: &T,
    json: Value,
    changes: &serde_json::Map<String, Value>,
    id: &str,
) -> T
where
    T: Clone + DeserializeOwned,
{
    let Value::Object(mut object) = json else {
        return row.clone();
    };
    for (field, value) in changes {
        object.insert(field.clone(), value.clone());
    }
    match serde_json::from_value::<T>(Value::Object(object)) {
        Ok(updated) => updated,
        Err(e) => {
            warn!(id = id, error = %e, "Pending update does not fit the row type, keeping server row");
            row.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wellness_core::{RecordId, Table};

    fn pending(id: &str, operation: PendingOperation) -> OptimisticUpdate {
        OptimisticUpdate::pending(Table::Entries, RecordId::from(id), operation)
    }

    #[test]
    fn test_row_id_accepts_strings_and_numbers() {
        assert_eq!(row_id(&json!({"id": "a"})), Some("a".to_string()));
        assert_eq!(row_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(row_id(&json!({"title": "x"})), None);
    }

    #[test]
    fn test_insert_already_served_is_not_duplicated() {
        let entries = vec![pending(
            "e1",
            PendingOperation::Insert {
                entity: json!({"id": "e1", "title": "optimistic"}),
            },
        )];
        let rows = vec![json!({"id": "e1", "title": "server"})];
        assert_eq!(overlay(&entries, &rows), rows);
    }

    #[test]
    fn test_failed_entries_do_not_overlay() {
        let mut entry = pending("e1", PendingOperation::Delete { original: None });
        entry.status = super::super::record::UpdateStatus::Failed {
            error: "boom".to_string(),
        };
        let rows = vec![json!({"id": "e1"})];
        assert_eq!(overlay(&[entry], &rows), rows);
    }

    #[test]
    fn test_rows_without_ids_pass_through() {
        let entries = vec![pending("e1", PendingOperation::Delete { original: None })];
        let rows = vec![json!({"title": "no id"})];
        assert_eq!(overlay(&entries, &rows), rows);
    }
}
