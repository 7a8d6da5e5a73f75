//! Local cache of pulled collections.
//!
//! Cache access is best-effort: storage failures are logged and reads fall
//! back to an empty collection, so nothing here ever fails a caller.

use std::sync::Arc;

use berth_engine::{CachedCollection, CollectionName, Timestamp, LAST_SYNC_KEY};

use crate::now_millis;
use crate::storage::KeyValueStore;

/// Persistent cache of the boats, bookings and messages collections.
///
/// The store exclusively owns the `cached_*` and `last_sync` keys.
#[derive(Clone)]
pub struct LocalCacheStore {
    storage: Arc<dyn KeyValueStore>,
}

impl LocalCacheStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Replace a collection and stamp it with the current time.
    pub fn write_collection(&self, name: CollectionName, items: Vec<serde_json::Value>) {
        self.write_collection_at(name, items, now_millis());
    }

    pub fn write_collection_at(
        &self,
        name: CollectionName,
        items: Vec<serde_json::Value>,
        now: Timestamp,
    ) {
        let cached = CachedCollection::new(name, items, now);
        let json = match serde_json::to_string(&cached) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(collection = %name, error = %e, "Failed to serialize collection");
                return;
            }
        };

        match self.storage.set(name.storage_key(), &json) {
            Ok(()) => tracing::debug!(
                collection = %name,
                items = cached.items.len(),
                "Cached collection written"
            ),
            Err(e) => tracing::warn!(collection = %name, error = %e, "Failed to write cache"),
        }
    }

    /// Items of the last write, or empty if never written or unreadable.
    ///
    /// Freshness is not checked; see [`LocalCacheStore::is_stale`].
    pub fn read_collection(&self, name: CollectionName) -> Vec<serde_json::Value> {
        self.entry(name).map(|c| c.items).unwrap_or_default()
    }

    /// The cached collection with its fetch time.
    pub fn entry(&self, name: CollectionName) -> Option<CachedCollection> {
        let json = match self.storage.get(name.storage_key()) {
            Ok(json) => json?,
            Err(e) => {
                tracing::warn!(collection = %name, error = %e, "Failed to read cache");
                return None;
            }
        };

        match serde_json::from_str::<CachedCollection>(&json) {
            Ok(cached) if cached.name == name => Some(cached),
            Ok(cached) => {
                tracing::warn!(
                    collection = %name,
                    found = %cached.name,
                    "Cache entry holds the wrong collection"
                );
                None
            }
            Err(e) => {
                tracing::warn!(collection = %name, error = %e, "Corrupt cache entry");
                None
            }
        }
    }

    /// Whether the collection is missing or older than its threshold.
    pub fn is_stale(&self, name: CollectionName) -> bool {
        self.is_stale_at(name, now_millis())
    }

    pub fn is_stale_at(&self, name: CollectionName, now: Timestamp) -> bool {
        self.entry(name).map_or(true, |c| c.is_stale(now))
    }

    /// When the last full sync completed.
    pub fn last_sync(&self) -> Option<Timestamp> {
        match self.storage.get(LAST_SYNC_KEY) {
            Ok(value) => value.and_then(|v| v.trim().parse().ok()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read last sync marker");
                None
            }
        }
    }

    pub fn mark_synced(&self, now: Timestamp) {
        if let Err(e) = self.storage.set(LAST_SYNC_KEY, &now.to_string()) {
            tracing::warn!(error = %e, "Failed to write last sync marker");
        }
    }

    /// Remove every cached collection and the last-sync marker.
    pub fn clear(&self) {
        for name in CollectionName::ALL {
            if let Err(e) = self.storage.remove(name.storage_key()) {
                tracing::warn!(collection = %name, error = %e, "Failed to clear cache");
            }
        }
        if let Err(e) = self.storage.remove(LAST_SYNC_KEY) {
            tracing::warn!(error = %e, "Failed to clear last sync marker");
        }
    }
}
