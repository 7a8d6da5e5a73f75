//! Berth Client - offline cache and action replay for the Berth app.
//!
//! Wraps [`berth_engine`] with durable storage, a REST client and the async
//! machinery that keeps them in step:
//!
//! - [`LocalCacheStore`] mirrors the boats, bookings and messages collections.
//! - [`PendingActionLog`] holds mutations made while offline.
//! - [`ConnectivityMonitor`] turns reachability signals into transitions.
//! - [`ModeController`] gates queue-vs-send and triggers a sync on reconnect.
//! - [`SyncCoordinator`] replays the log in order and refreshes the cache.
//!
//! [`OfflineService`] wires them together and is what call sites hold.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod mode;
pub mod pending;
pub mod service;
pub mod storage;

pub use api::{HttpApi, SyncApi};
pub use cache::LocalCacheStore;
pub use config::{Config, ConfigError};
pub use connectivity::{ConnectivityMonitor, NetworkStatus, Subscription};
pub use coordinator::{DrainReport, PullReport, SyncCoordinator};
pub use error::{ClientError, Result};
pub use events::{EventBus, SyncEvent};
pub use mode::{ModeController, SyncTrigger};
pub use pending::PendingActionLog;
pub use service::{OfflineService, OfflineServiceBuilder, ServiceStatus, Submission};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use berth_engine::Timestamp;

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
