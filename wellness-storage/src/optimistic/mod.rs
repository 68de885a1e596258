//! Optimistic update ledger.
//!
//! UI code registers a mutation here before sending it to the remote data
//! source, renders lists through [`OptimisticLedger::apply_updates`], and
//! reports the outcome with `confirm_update` or `fail_update`.
//!
//! # Lifecycle
//!
//! ```text
//! create_* ──► Pending ──confirm_update──► Confirmed (removed)
//!                 │  ▲
//!     fail_update │  │ retry
//!                 ▼  │
//!               Failed ──discard──► removed
//! ```
//!
//! The ledger is memory-only. Entries still pending when the process goes
//! away are lost, and correctness comes from the next read of the remote
//! source.

mod ledger;
mod merge;
pub mod record;

pub use ledger::{Listener, ListenerId, OptimisticLedger, DEFAULT_EVENT_CAPACITY};
pub use record::{
    LedgerEvent, LedgerStats, OperationKind, OptimisticUpdate, PendingOperation, UpdateStatus,
};
