//! In-memory ledger of optimistic mutations.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use wellness_core::{RecordId, Table};

use super::merge::{overlay, row_id};
use super::record::{
    LedgerEvent, LedgerStats, OptimisticUpdate, PendingOperation, UpdateStatus,
};
use crate::lock::{read_lock, write_lock};

/// Default buffer of the ledger broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Synchronous ledger listener.
///
/// Listeners run after the ledger lock is released, so they may read the
/// ledger. They must not mutate it, or notifications recurse.
pub type Listener = Arc<dyn Fn(&LedgerEvent) + Send + Sync>;

/// Handle returned by [`OptimisticLedger::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LedgerKey {
    table: Table,
    id: RecordId,
}

/// Ledger of pending and failed optimistic mutations.
///
/// Holds at most one entry per `(table, id)`; registering a new operation
/// on the same pair replaces the previous entry. Nothing is persisted.
pub struct OptimisticLedger {
    entries: RwLock<HashMap<LedgerKey, OptimisticUpdate>>,
    confirmed_total: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    events: broadcast::Sender<LedgerEvent>,
}

impl OptimisticLedger {
    /// Create an empty ledger whose broadcast channel buffers `capacity`
    /// events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(HashMap::new()),
            confirmed_total: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            events,
        }
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Register a pending insert.
    ///
    /// The entity must already carry its temporary id in an `id` field.
    /// Returns that id, or `None` when the entity has none and nothing was
    /// registered.
    pub fn create_optimistic_insert<T: Serialize>(
        &self,
        table: Table,
        entity: &T,
    ) -> Option<RecordId> {
        let entity = match serde_json::to_value(entity) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(table = %table, error = %e, "Optimistic insert could not be serialized");
                return None;
            }
        };
        let Some(id) = row_id(&entity) else {
            warn!(table = %table, "Optimistic insert has no id field, not registered");
            return None;
        };
        let id = RecordId::new(id);
        self.register(table, id.clone(), PendingOperation::Insert { entity });
        Some(id)
    }

    /// Register a pending update of `id`, keeping `original` for rollback.
    pub fn create_optimistic_update(
        &self,
        table: Table,
        id: RecordId,
        changes: Map<String, Value>,
        original: Option<Value>,
    ) {
        self.register(table, id, PendingOperation::Update { changes, original });
    }

    /// Register a pending delete of `id`, keeping `original` for rollback.
    pub fn create_optimistic_delete(&self, table: Table, id: RecordId, original: Option<Value>) {
        self.register(table, id, PendingOperation::Delete { original });
    }

    fn register(&self, table: Table, id: RecordId, operation: PendingOperation) {
        let kind = operation.kind();
        let update = OptimisticUpdate::pending(table, id.clone(), operation);
        let replaced = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            entries
                .insert(
                    LedgerKey {
                        table,
                        id: id.clone(),
                    },
                    update,
                )
                .is_some()
        };
        debug!(table = %table, id = %id, kind = ?kind, replaced, "Registered optimistic update");
        self.notify(LedgerEvent::Created {
            table,
            id,
            kind,
            replaced,
        });
    }

    // ========================================================================
    // RECONCILIATION
    // ========================================================================

    /// Mark the mutation of `id` confirmed and drop it from the ledger.
    ///
    /// `real_data` is the row returned by the server; for inserts the
    /// caller swaps the temporary id for the real one it carries. Returns
    /// the removed entry. When `id` has entries in several tables, the
    /// pending one is chosen, then the oldest; prefer
    /// [`confirm_update_in`](Self::confirm_update_in) when the table is known.
    pub fn confirm_update(
        &self,
        id: &RecordId,
        real_data: Option<&Value>,
    ) -> Option<OptimisticUpdate> {
        self.confirm(None, id, real_data)
    }

    /// [`confirm_update`](Self::confirm_update) for the entry of `(table, id)`.
    pub fn confirm_update_in(
        &self,
        table: Table,
        id: &RecordId,
        real_data: Option<&Value>,
    ) -> Option<OptimisticUpdate> {
        self.confirm(Some(table), id, real_data)
    }

    fn confirm(
        &self,
        table: Option<Table>,
        id: &RecordId,
        real_data: Option<&Value>,
    ) -> Option<OptimisticUpdate> {
        let removed = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            resolve(&entries, table, id, |_| true).and_then(|key| entries.remove(&key))
        };
        let mut removed = removed?;
        removed.status = UpdateStatus::Confirmed;
        self.confirmed_total.fetch_add(1, Ordering::Relaxed);

        let real_id = real_data.and_then(row_id).map(RecordId::new);
        debug!(table = %removed.table, id = %id, real_id = ?real_id, "Confirmed optimistic update");
        self.notify(LedgerEvent::Confirmed {
            table: removed.table,
            id: id.clone(),
            real_id,
        });
        Some(removed)
    }

    /// Mark the mutation of `id` failed.
    ///
    /// The entry stays in the ledger, with its original value, until it is
    /// discarded or retried. Returns the updated entry. Resolves an id
    /// shared by several tables like [`confirm_update`](Self::confirm_update).
    pub fn fail_update(&self, id: &RecordId, error: impl Into<String>) -> Option<OptimisticUpdate> {
        self.fail(None, id, error.into())
    }

    /// [`fail_update`](Self::fail_update) for the entry of `(table, id)`.
    pub fn fail_update_in(
        &self,
        table: Table,
        id: &RecordId,
        error: impl Into<String>,
    ) -> Option<OptimisticUpdate> {
        self.fail(Some(table), id, error.into())
    }

    fn fail(&self, table: Option<Table>, id: &RecordId, error: String) -> Option<OptimisticUpdate> {
        let failed = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            let key = resolve(&entries, table, id, |_| true)?;
            entries.get_mut(&key).map(|entry| {
                entry.status = UpdateStatus::Failed {
                    error: error.clone(),
                };
                entry.clone()
            })
        }?;
        warn!(table = %failed.table, id = %id, error = %error, "Optimistic update failed");
        self.notify(LedgerEvent::Failed {
            table: failed.table,
            id: id.clone(),
            error,
        });
        Some(failed)
    }

    /// Move a failed entry back to pending. Returns false when `id` has no
    /// failed entry.
    pub fn retry(&self, id: &RecordId) -> bool {
        self.retry_entry(None, id)
    }

    /// [`retry`](Self::retry) for the entry of `(table, id)`.
    pub fn retry_in(&self, table: Table, id: &RecordId) -> bool {
        self.retry_entry(Some(table), id)
    }

    fn retry_entry(&self, table: Option<Table>, id: &RecordId) -> bool {
        let table = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            resolve(&entries, table, id, |entry| entry.status.is_failed())
                .and_then(|key| entries.get_mut(&key))
                .map(|entry| {
                    entry.status = UpdateStatus::Pending;
                    entry.created_at = Utc::now();
                    entry.table
                })
        };
        match table {
            Some(table) => {
                debug!(table = %table, id = %id, "Retrying optimistic update");
                self.notify(LedgerEvent::Retried {
                    table,
                    id: id.clone(),
                });
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id` in any state, typically after rolling back
    /// a failure.
    pub fn discard(&self, id: &RecordId) -> Option<OptimisticUpdate> {
        self.discard_entry(None, id)
    }

    /// [`discard`](Self::discard) for the entry of `(table, id)`.
    pub fn discard_in(&self, table: Table, id: &RecordId) -> Option<OptimisticUpdate> {
        self.discard_entry(Some(table), id)
    }

    fn discard_entry(&self, table: Option<Table>, id: &RecordId) -> Option<OptimisticUpdate> {
        let removed = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            resolve(&entries, table, id, |_| true).and_then(|key| entries.remove(&key))
        }?;
        debug!(table = %removed.table, id = %id, "Discarded optimistic update");
        self.notify(LedgerEvent::Discarded {
            table: removed.table,
            id: id.clone(),
        });
        Some(removed)
    }

    /// Drop entries created more than `max_age` ago.
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let cutoff = match chrono::TimeDelta::from_std(max_age) {
            Ok(age) => Utc::now() - age,
            Err(_) => return 0,
        };
        let removed = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            let before = entries.len();
            entries.retain(|_, entry| entry.created_at >= cutoff);
            before - entries.len()
        };
        if removed > 0 {
            debug!(removed, "Pruned stale optimistic updates");
            self.notify(LedgerEvent::Pruned { removed });
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut entries = write_lock(&self.entries, "ledger.entries");
            let removed = entries.len();
            entries.clear();
            removed
        };
        debug!(removed, "Cleared optimistic ledger");
        self.notify(LedgerEvent::Cleared { removed });
        removed
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Merge pending entries for `table` into the authoritative `rows`.
    ///
    /// Pending inserts are appended, pending updates overlay matching rows
    /// by id and pending deletes remove matching rows. `rows` is not
    /// modified and the ledger is not touched.
    pub fn apply_updates<T>(&self, table: Table, rows: &[T]) -> Vec<T>
    where
        T: Clone + Serialize + DeserializeOwned,
    {
        let entries = self.get_updates_for_table(table);
        if entries.is_empty() {
            return rows.to_vec();
        }
        overlay(&entries, rows)
    }

    /// All entries for `table`, oldest first.
    pub fn get_updates_for_table(&self, table: Table) -> Vec<OptimisticUpdate> {
        let mut updates: Vec<OptimisticUpdate> = read_lock(&self.entries, "ledger.entries")
            .values()
            .filter(|entry| entry.table == table)
            .cloned()
            .collect();
        updates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        updates
    }

    /// Entry for `(table, id)`, if any.
    pub fn get(&self, table: Table, id: &RecordId) -> Option<OptimisticUpdate> {
        read_lock(&self.entries, "ledger.entries")
            .get(&LedgerKey {
                table,
                id: id.clone(),
            })
            .cloned()
    }

    /// Whether `table` has any mutation still awaiting the server.
    pub fn has_pending(&self, table: Table) -> bool {
        read_lock(&self.entries, "ledger.entries")
            .values()
            .any(|entry| entry.table == table && entry.status.is_pending())
    }

    pub fn pending_count(&self) -> usize {
        read_lock(&self.entries, "ledger.entries")
            .values()
            .filter(|entry| entry.status.is_pending())
            .count()
    }

    pub fn get_stats(&self) -> LedgerStats {
        let entries = read_lock(&self.entries, "ledger.entries");
        let mut stats = LedgerStats {
            confirmed: self.confirmed_total.load(Ordering::Relaxed),
            ..LedgerStats::default()
        };
        for entry in entries.values() {
            match entry.status {
                UpdateStatus::Pending => stats.pending += 1,
                UpdateStatus::Failed { .. } => stats.failed += 1,
                UpdateStatus::Confirmed => {}
            }
            *stats.by_table.entry(entry.table).or_default() += 1;
        }
        stats
    }

    // ========================================================================
    // NOTIFICATION
    // ========================================================================

    /// Register a listener invoked synchronously after every mutation.
    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        write_lock(&self.listeners, "ledger.listeners").push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = write_lock(&self.listeners, "ledger.listeners");
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Subscribe to ledger events as a broadcast stream.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: LedgerEvent) {
        let listeners: Vec<Listener> = read_lock(&self.listeners, "ledger.listeners")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener(&event);
        }

        let event_type = event.event_type();
        match self.events.send(event) {
            Ok(receivers) => debug!(event_type, receivers, "Broadcast ledger event"),
            Err(_) => debug!(event_type, "No receivers for ledger event"),
        }
    }
}

/// Key of the entry for `id` accepted by `accept`, restricted to `table`
/// when given.
///
/// Without a table, an id present in several tables resolves to a pending
/// entry before a failed one, then to the oldest, then by table order.
fn resolve(
    entries: &HashMap<LedgerKey, OptimisticUpdate>,
    table: Option<Table>,
    id: &RecordId,
    accept: impl Fn(&OptimisticUpdate) -> bool,
) -> Option<LedgerKey> {
    if let Some(table) = table {
        let key = LedgerKey {
            table,
            id: id.clone(),
        };
        return entries
            .get(&key)
            .filter(|entry| accept(entry))
            .map(|_| key);
    }
    entries
        .iter()
        .filter(|(key, entry)| &key.id == id && accept(entry))
        .min_by(|(a_key, a), (b_key, b)| {
            b.status
                .is_pending()
                .cmp(&a.status.is_pending())
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a_key.table.cmp(&b_key.table))
        })
        .map(|(key, _)| key.clone())
}

impl Default for OptimisticLedger {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for OptimisticLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticLedger")
            .field("stats", &self.get_stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn changes(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_insert_confirm_scenario_has_no_duplicates() {
        let ledger = OptimisticLedger::default();
        let id = ledger
            .create_optimistic_insert(Table::Entries, &json!({"id": "temp_1", "title": "Run"}))
            .unwrap();
        assert_eq!(id.as_str(), "temp_1");

        let empty: Vec<Value> = vec![];
        assert_eq!(
            ledger.apply_updates(Table::Entries, &empty),
            vec![json!({"id": "temp_1", "title": "Run"})]
        );

        let real = json!({"id": "real_42", "title": "Run"});
        let confirmed = ledger.confirm_update(&id, Some(&real)).unwrap();
        assert_eq!(confirmed.status, UpdateStatus::Confirmed);

        let server = vec![real.clone()];
        assert_eq!(ledger.apply_updates(Table::Entries, &server), vec![real]);
    }

    #[test]
    fn test_update_overlay_replaces_fields() {
        let ledger = OptimisticLedger::default();
        ledger.create_optimistic_update(
            Table::Entries,
            RecordId::from("e1"),
            changes(json!({"title": "Swim"})),
            None,
        );
        let rows = vec![
            json!({"id": "e1", "title": "Run", "value": 5}),
            json!({"id": "e2", "title": "Walk"}),
        ];
        let merged = ledger.apply_updates(Table::Entries, &rows);
        assert_eq!(
            merged,
            vec![
                json!({"id": "e1", "title": "Swim", "value": 5}),
                json!({"id": "e2", "title": "Walk"}),
            ]
        );
        assert_eq!(rows[0]["title"], "Run");
    }

    #[test]
    fn test_delete_overlay_removes_row() {
        let ledger = OptimisticLedger::default();
        ledger.create_optimistic_delete(Table::Goals, RecordId::from("g1"), None);
        let rows = vec![json!({"id": "g1"}), json!({"id": "g2"})];
        assert_eq!(ledger.apply_updates(Table::Goals, &rows), vec![json!({"id": "g2"})]);
        // Other tables are untouched.
        assert_eq!(ledger.apply_updates(Table::Entries, &rows), rows);
    }

    #[test]
    fn test_new_operation_replaces_prior_entry() {
        let ledger = OptimisticLedger::default();
        let id = RecordId::from("e1");
        ledger.create_optimistic_update(
            Table::Entries,
            id.clone(),
            changes(json!({"title": "A"})),
            None,
        );
        ledger.create_optimistic_delete(Table::Entries, id.clone(), None);

        let updates = ledger.get_updates_for_table(Table::Entries);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind(), super::super::record::OperationKind::Delete);
    }

    #[test]
    fn test_fail_retains_original_and_stops_overlay() {
        let ledger = OptimisticLedger::default();
        let id = RecordId::from("e1");
        let original = json!({"id": "e1", "title": "Run"});
        ledger.create_optimistic_update(
            Table::Entries,
            id.clone(),
            changes(json!({"title": "Swim"})),
            Some(original.clone()),
        );

        let failed = ledger.fail_update(&id, "network down").unwrap();
        assert_eq!(failed.original_value(), Some(&original));
        assert_eq!(failed.error(), Some("network down"));

        let rows = vec![original.clone()];
        assert_eq!(ledger.apply_updates(Table::Entries, &rows), rows);

        let stats = ledger.get_stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);

        assert!(ledger.discard(&id).is_some());
        assert!(ledger.get_updates_for_table(Table::Entries).is_empty());
    }

    #[test]
    fn test_retry_restores_pending_overlay() {
        let ledger = OptimisticLedger::default();
        let id = RecordId::from("g1");
        ledger.create_optimistic_delete(Table::Goals, id.clone(), None);
        ledger.fail_update(&id, "timeout");
        assert!(!ledger.has_pending(Table::Goals));

        assert!(ledger.retry(&id));
        assert!(ledger.has_pending(Table::Goals));
        assert!(!ledger.retry(&id), "only failed entries can be retried");

        let rows = vec![json!({"id": "g1"})];
        assert!(ledger.apply_updates(Table::Goals, &rows).is_empty());
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        let ledger = OptimisticLedger::default();
        let id = RecordId::from("missing");
        assert!(ledger.confirm_update(&id, None).is_none());
        assert!(ledger.fail_update(&id, "x").is_none());
        assert!(ledger.discard(&id).is_none());
        assert_eq!(ledger.get_stats(), LedgerStats::default());
    }

    #[test]
    fn test_scoped_reconciliation_ignores_other_tables() {
        let ledger = OptimisticLedger::default();
        let id = RecordId::from("1");
        ledger.create_optimistic_delete(Table::Entries, id.clone(), None);
        ledger.create_optimistic_update(
            Table::Goals,
            id.clone(),
            changes(json!({"title": "New"})),
            None,
        );

        let confirmed = ledger.confirm_update_in(Table::Goals, &id, None).unwrap();
        assert_eq!(confirmed.table, Table::Goals);
        assert!(ledger.get(Table::Goals, &id).is_none());
        let entry = ledger.get(Table::Entries, &id).unwrap();
        assert!(entry.status.is_pending());

        assert!(ledger.confirm_update_in(Table::Goals, &id, None).is_none());
        assert!(ledger.fail_update_in(Table::Categories, &id, "boom").is_none());
        assert!(!ledger.retry_in(Table::Entries, &id));

        let failed = ledger.fail_update_in(Table::Entries, &id, "boom").unwrap();
        assert_eq!(failed.table, Table::Entries);
        assert!(ledger.retry_in(Table::Entries, &id));
        assert_eq!(ledger.discard_in(Table::Entries, &id).unwrap().table, Table::Entries);
        assert_eq!(ledger.get_stats().total(), 0);
    }

    #[test]
    fn test_shared_id_resolves_deterministically() {
        for _ in 0..20 {
            let ledger = OptimisticLedger::default();
            let id = RecordId::from("1");
            ledger.create_optimistic_delete(Table::Entries, id.clone(), None);
            ledger.create_optimistic_delete(Table::Goals, id.clone(), None);

            // Both pending: the older entry (entries) wins.
            assert_eq!(ledger.fail_update(&id, "boom").unwrap().table, Table::Entries);
            // Pending before failed.
            assert_eq!(ledger.confirm_update(&id, None).unwrap().table, Table::Goals);
            // Retry only considers failed entries.
            assert!(ledger.retry(&id));
            assert_eq!(ledger.discard(&id).unwrap().table, Table::Entries);
        }
    }

    #[test]
    fn test_insert_without_id_is_not_registered() {
        let ledger = OptimisticLedger::default();
        assert!(ledger
            .create_optimistic_insert(Table::Entries, &json!({"title": "no id"}))
            .is_none());
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn test_stats_count_confirmed_over_lifetime() {
        let ledger = OptimisticLedger::default();
        for n in 0..3 {
            let id = RecordId::new(format!("temp_{n}"));
            ledger.create_optimistic_insert(Table::Entries, &json!({"id": id}));
        }
        ledger.create_optimistic_delete(Table::Goals, RecordId::from("g1"), None);
        ledger.confirm_update(&RecordId::from("temp_0"), None);
        ledger.fail_update(&RecordId::from("temp_1"), "boom");

        let stats = ledger.get_stats();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.by_table.get(&Table::Entries), Some(&2));
        assert_eq!(stats.by_table.get(&Table::Goals), Some(&1));
        assert_eq!(ledger.pending_count(), 2);
    }

    #[test]
    fn test_listeners_see_every_mutation() {
        let ledger = OptimisticLedger::default();
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener_id = ledger.add_listener(Arc::new(move |event: &LedgerEvent| {
            sink.lock().unwrap().push(event.event_type());
        }));

        let id = RecordId::from("temp_1");
        ledger.create_optimistic_insert(Table::Entries, &json!({"id": "temp_1"}));
        ledger.fail_update(&id, "boom");
        ledger.retry(&id);
        ledger.confirm_update(&id, None);

        assert!(ledger.remove_listener(listener_id));
        assert!(!ledger.remove_listener(listener_id));
        ledger.clear();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["created", "failed", "retried", "confirmed"]
        );
    }

    #[test]
    fn test_listener_may_read_ledger() {
        let ledger = Arc::new(OptimisticLedger::default());
        let observed = Arc::new(AtomicU64::new(0));
        let reader = Arc::clone(&ledger);
        let sink = Arc::clone(&observed);
        ledger.add_listener(Arc::new(move |_event: &LedgerEvent| {
            sink.store(reader.pending_count() as u64, Ordering::SeqCst);
        }));

        ledger.create_optimistic_delete(Table::Entries, RecordId::from("e1"), None);
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_broadcast_events() {
        let ledger = OptimisticLedger::new(8);
        let mut rx = ledger.subscribe();

        ledger.create_optimistic_delete(Table::Goals, RecordId::from("g1"), None);
        ledger.confirm_update(&RecordId::from("g1"), Some(&json!({"id": "g1"})));

        let created = rx.recv().await.unwrap();
        assert!(matches!(created, LedgerEvent::Created { replaced: false, .. }));
        let confirmed = rx.recv().await.unwrap();
        assert_eq!(
            confirmed,
            LedgerEvent::Confirmed {
                table: Table::Goals,
                id: RecordId::from("g1"),
                real_id: Some(RecordId::from("g1")),
            }
        );
    }

    #[test]
    fn test_prune_drops_old_entries() {
        let ledger = OptimisticLedger::default();
        ledger.create_optimistic_delete(Table::Entries, RecordId::from("e1"), None);
        {
            let mut entries = write_lock(&ledger.entries, "test");
            for entry in entries.values_mut() {
                entry.created_at = Utc::now() - chrono::TimeDelta::hours(2);
            }
        }
        ledger.create_optimistic_delete(Table::Entries, RecordId::from("e2"), None);

        assert_eq!(ledger.prune_older_than(Duration::from_secs(3600)), 1);
        let remaining = ledger.get_updates_for_table(Table::Entries);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "e2");
    }

    #[test]
    fn test_clear_empties_ledger() {
        let ledger = OptimisticLedger::default();
        ledger.create_optimistic_delete(Table::Entries, RecordId::from("e1"), None);
        assert_eq!(ledger.clear(), 1);
        assert_eq!(ledger.clear(), 0);
        assert_eq!(ledger.get_stats().total(), 0);
    }
}
