//! OfflineStore - the in-memory state container.
//!
//! The store holds the cached collections, the pending action log and the
//! sync state of one device. It performs no IO; hosts persist it through
//! snapshots or through the per-key JSON of its parts.

use crate::{
    error::Result, ActionId, ActionKind, CacheState, CollectionName, Error, FailureOutcome,
    NodeId, OfflineSnapshot, PendingAction, PendingLog, SyncState, Timestamp, Transition,
};
use serde::{Deserialize, Serialize};

/// Summary of the offline state for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_offline: bool,
    pub last_sync_at: Option<Timestamp>,
    pub pending_count: usize,
    /// Collections missing from the cache or past their threshold
    pub stale_collections: Vec<CollectionName>,
}

/// The main store holding all offline state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStore {
    node_id: NodeId,
    cache: CacheState,
    pending: PendingLog,
    state: SyncState,
}

impl OfflineStore {
    /// Create an empty, ONLINE store for a device.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        let node_id = node_id.into();
        Self {
            pending: PendingLog::new(node_id.clone()),
            node_id,
            cache: CacheState::new(),
            state: SyncState::new(),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn cache(&self) -> &CacheState {
        &self.cache
    }

    pub fn pending(&self) -> &PendingLog {
        &self.pending
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Replace a cached collection.
    pub fn write_collection(
        &mut self,
        name: CollectionName,
        items: Vec<serde_json::Value>,
        now: Timestamp,
    ) {
        self.cache.write(name, items, now);
    }

    pub fn read_collection(&self, name: CollectionName) -> &[serde_json::Value] {
        self.cache.read(name)
    }

    pub fn enqueue(
        &mut self,
        kind: ActionKind,
        payload: serde_json::Value,
        now: Timestamp,
    ) -> ActionId {
        self.pending.enqueue(kind, payload, now)
    }

    pub fn list_pending(&self) -> &[PendingAction] {
        self.pending.list()
    }

    /// Remove a delivered action.
    pub fn remove(&mut self, id: &str) -> Result<PendingAction> {
        self.pending
            .remove(id)
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))
    }

    pub fn record_failure(&mut self, id: &str) -> Result<FailureOutcome> {
        self.pending.record_failure(id)
    }

    pub fn set_offline(&mut self, offline: bool) -> Transition {
        self.state.set_offline(offline)
    }

    pub fn is_offline(&self) -> bool {
        self.state.is_offline
    }

    pub fn mark_synced(&mut self, now: Timestamp) {
        self.state.mark_synced(now);
    }

    /// Drop cached collections, pending actions and the last-sync marker.
    /// The current mode is kept.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.pending.clear();
        self.state.last_sync_at = None;
    }

    pub fn status(&self, now: Timestamp) -> SyncStatus {
        SyncStatus {
            is_offline: self.state.is_offline,
            last_sync_at: self.state.last_sync_at,
            pending_count: self.pending.len(),
            stale_collections: self.cache.stale_collections(now),
        }
    }

    /// Export the current state as a snapshot.
    pub fn export_state(&self) -> OfflineSnapshot {
        let mut snapshot = OfflineSnapshot::new(self.node_id.clone());
        snapshot.clock = self.pending.clock().clone();
        snapshot.sync_state = self.state.clone();

        for cached in self.cache.entries() {
            snapshot.add_collection(cached.clone());
        }
        for action in self.pending.list() {
            snapshot.add_pending(action.clone());
        }

        snapshot
    }

    /// Replace the current state with a snapshot taken on the same device.
    pub fn import_state(&mut self, snapshot: OfflineSnapshot) -> Result<()> {
        snapshot.validate()?;

        if snapshot.node_id != self.node_id {
            return Err(Error::InvalidSnapshot(format!(
                "node ID mismatch: expected '{}', got '{}'",
                self.node_id, snapshot.node_id
            )));
        }

        self.cache.clear();
        for (_, cached) in snapshot.collections {
            self.cache.insert(cached);
        }

        self.pending.restore(snapshot.pending_actions);
        self.pending.restore_clock(snapshot.clock);
        self.state = snapshot.sync_state;

        Ok(())
    }
}
