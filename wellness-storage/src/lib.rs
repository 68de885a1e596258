//! Client-side data layer for the wellness tracker.
//!
//! - [`optimistic`]: ledger of mutations sent but not yet acknowledged,
//!   overlaid on server rows so the UI reflects them immediately.
//! - [`cache`]: TTL query cache with stale-while-revalidate reads and
//!   tag-based invalidation.
//! - [`remote`]: the narrow CRUD interface to the remote store.
//! - [`client`]: read-through and optimistic write flows over all three.
//! - [`context`]: the owned state passed around instead of globals.

pub mod cache;
pub mod client;
pub mod context;
mod lock;
pub mod optimistic;
pub mod query;
pub mod remote;

pub use cache::{CacheLookup, CacheSetOptions, CacheStats, Freshness, QueryCache};
pub use client::{DataClient, ReadOptions};
pub use context::{AppContext, MaintenanceReport};
pub use optimistic::{
    LedgerEvent, LedgerStats, OperationKind, OptimisticLedger, OptimisticUpdate, PendingOperation,
    UpdateStatus,
};
pub use query::{Filters, OrderBy, QueryDescriptor};
pub use remote::{InMemoryDataSource, RemoteDataSource};
