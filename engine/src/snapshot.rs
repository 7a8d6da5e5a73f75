//! Snapshot types for persisting and restoring offline state.
//!
//! Snapshots are the bridge between the in-memory [`crate::OfflineStore`]
//! and a host's persistent storage. Serialization order is deterministic.

use crate::{
    error::Result, ActionClock, CachedCollection, CollectionName, Error, NodeId, PendingAction,
    SyncState, MAX_RETRIES,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of cache, pending log and sync state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Device the snapshot was taken on
    pub node_id: NodeId,
    /// Id clock, so restored stores never reuse action ids
    pub clock: ActionClock,
    pub sync_state: SyncState,
    /// Cached collections keyed by name (BTreeMap for deterministic order)
    pub collections: BTreeMap<CollectionName, CachedCollection>,
    /// Pending actions in enqueue order
    pub pending_actions: Vec<PendingAction>,
}

impl OfflineSnapshot {
    /// Create a new empty snapshot.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        let node_id = node_id.into();
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            node_id: node_id.clone(),
            clock: ActionClock::new(node_id),
            sync_state: SyncState::default(),
            collections: BTreeMap::new(),
            pending_actions: Vec::new(),
        }
    }

    pub fn add_collection(&mut self, cached: CachedCollection) {
        self.collections.insert(cached.name, cached);
    }

    pub fn add_pending(&mut self, action: PendingAction) {
        self.pending_actions.push(action);
    }

    /// Check internal consistency before import.
    pub fn validate(&self) -> Result<()> {
        for (name, cached) in &self.collections {
            if *name != cached.name {
                return Err(Error::InvalidSnapshot(format!(
                    "collection '{}' stored under key '{}'",
                    cached.name, name
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for action in &self.pending_actions {
            if !seen.insert(action.id.as_str()) {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate pending action id: {}",
                    action.id
                )));
            }
            if action.retry_count >= MAX_RETRIES {
                return Err(Error::InvalidSnapshot(format!(
                    "pending action {} exceeded retry limit",
                    action.id
                )));
            }
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::UnsupportedFormat {
                found: snapshot.format_version,
                supported: SNAPSHOT_FORMAT_VERSION,
            });
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionKind;
    use serde_json::json;

    #[test]
    fn create_empty_snapshot() {
        let snapshot = OfflineSnapshot::new("device-1");
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(snapshot.node_id, "device-1");
        assert!(snapshot.collections.is_empty());
        assert!(snapshot.pending_actions.is_empty());
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn json_roundtrip() {
        let mut snapshot = OfflineSnapshot::new("device-1");
        snapshot.add_collection(CachedCollection::new(
            CollectionName::Boats,
            vec![json!({"id": 1, "name": "Sea Breeze"})],
            1000,
        ));
        snapshot.add_pending(PendingAction::new(
            "1000-device-1-1",
            ActionKind::Booking,
            json!({"boatId": 1}),
            1000,
        ));

        let json = snapshot.to_json().unwrap();
        let parsed = OfflineSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn rejects_newer_format() {
        let mut snapshot = OfflineSnapshot::new("device-1");
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        let json = serde_json::to_string(&snapshot).unwrap();

        assert!(matches!(
            OfflineSnapshot::from_json(&json),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            OfflineSnapshot::from_json("[]"),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn validate_duplicate_ids() {
        let mut snapshot = OfflineSnapshot::new("device-1");
        let action = PendingAction::new("dup", ActionKind::Message, json!({}), 1);
        snapshot.add_pending(action.clone());
        snapshot.add_pending(action);
        assert!(matches!(
            snapshot.validate(),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn validate_exhausted_action() {
        let mut snapshot = OfflineSnapshot::new("device-1");
        let mut action = PendingAction::new("a", ActionKind::Review, json!({}), 1);
        action.retry_count = MAX_RETRIES;
        snapshot.add_pending(action);
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn validate_mismatched_key() {
        let mut snapshot = OfflineSnapshot::new("device-1");
        snapshot.collections.insert(
            CollectionName::Boats,
            CachedCollection::new(CollectionName::Messages, vec![], 1),
        );
        assert!(snapshot.validate().is_err());
    }
}
