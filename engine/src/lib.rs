//! # Berth Engine
//!
//! Deterministic offline state for the Berth boat-rental clients.
//!
//! This crate holds the logic that lets a client keep working without a
//! network: a local mirror of the boats, bookings and messages collections,
//! and an ordered log of user mutations waiting to be replayed against the
//! REST API once connectivity returns.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches storage, network or the wall clock;
//!   every time-dependent call takes `now` in milliseconds
//! - **Deterministic**: same inputs always produce the same state
//! - **Portable**: embedded by the async client runtime and, through [`ffi`],
//!   by mobile hosts
//!
//! ## Core Concepts
//!
//! ### Cached collections
//!
//! A [`CachedCollection`] is the last successful pull of one
//! [`CollectionName`]. Writes replace the whole collection; staleness is
//! judged by callers against [`CollectionName::staleness_threshold`].
//!
//! ### Pending actions
//!
//! A [`PendingAction`] is a queued booking, message, favorite or review.
//! The [`PendingLog`] appends at the back and drains from the front, so
//! replay order equals enqueue order. A failed replay bumps the retry count;
//! the failure that reaches [`MAX_RETRIES`] drops the action.
//!
//! ### Sync state
//!
//! [`SyncState`] holds the online/offline flag and the last sync time.
//! [`SyncState::set_offline`] reports a [`Transition`] so callers trigger
//! exactly one sync per OFFLINE -> ONLINE change.
//!
//! ## Quick Start
//!
//! ```rust
//! use berth_engine::{ActionKind, CollectionName, FailureOutcome, OfflineStore, Transition};
//! use serde_json::json;
//!
//! let mut store = OfflineStore::new("device-1");
//!
//! // Connectivity drops: mutations are queued instead of sent.
//! assert_eq!(store.set_offline(true), Transition::WentOffline);
//! let id = store.enqueue(ActionKind::Booking, json!({"boatId": 7}), 1706745600000);
//!
//! // Back online: replay oldest first.
//! assert_eq!(store.set_offline(false), Transition::CameOnline);
//! let next = store.list_pending()[0].clone();
//! assert_eq!(next.id, id);
//!
//! // First attempt fails, the action stays queued.
//! assert_eq!(store.record_failure(&id).unwrap(), FailureOutcome::Retry(1));
//!
//! // Second attempt succeeds.
//! store.remove(&id).unwrap();
//! assert!(store.list_pending().is_empty());
//!
//! // Pulls replace cached collections wholesale.
//! store.write_collection(CollectionName::Boats, vec![json!({"id": 7})], 1706745600000);
//! assert_eq!(store.read_collection(CollectionName::Boats).len(), 1);
//! ```
//!
//! ## Persistence
//!
//! Use [`OfflineStore::export_state`] and [`OfflineStore::import_state`] with
//! [`OfflineSnapshot`], or persist [`CachedCollection`] and the
//! [`PendingLog`] JSON under their own storage keys.

pub mod action;
pub mod cache;
pub mod clock;
pub mod collection;
pub mod error;
pub mod ffi;
pub mod mode;
pub mod queue;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use action::{ActionKind, PendingAction, MAX_RETRIES};
pub use cache::CacheState;
pub use clock::ActionClock;
pub use collection::{CachedCollection, CollectionName};
pub use error::Error;
pub use mode::{Mode, SyncState, Transition};
pub use queue::{FailureOutcome, PendingLog};
pub use snapshot::{OfflineSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{OfflineStore, SyncStatus};

/// Type aliases for clarity
pub type ActionId = String;
pub type NodeId = String;
pub type Timestamp = u64;

/// Storage key of the persisted pending action log.
pub const PENDING_ACTIONS_KEY: &str = "pending_actions";

/// Storage key of the last successful sync time.
pub const LAST_SYNC_KEY: &str = "last_sync";
