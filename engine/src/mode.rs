//! Online/offline mode and the sync bookkeeping that goes with it.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// The two connectivity modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Online,
    Offline,
}

/// Result of a mode change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The requested mode was already current.
    Unchanged,
    /// ONLINE -> OFFLINE. Periodic sync should stop.
    WentOffline,
    /// OFFLINE -> ONLINE. Exactly one sync should be triggered.
    CameOnline,
}

/// Process-wide sync state.
///
/// Starts ONLINE until the first connectivity signal says otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub is_offline: bool,
    pub last_sync_at: Option<Timestamp>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        if self.is_offline {
            Mode::Offline
        } else {
            Mode::Online
        }
    }

    /// Apply a connectivity signal.
    ///
    /// Repeated signals for the current mode report [`Transition::Unchanged`],
    /// which is what keeps a burst of "connected" events down to one sync.
    pub fn set_offline(&mut self, offline: bool) -> Transition {
        if self.is_offline == offline {
            return Transition::Unchanged;
        }
        self.is_offline = offline;
        if offline {
            Transition::WentOffline
        } else {
            Transition::CameOnline
        }
    }

    pub fn mark_synced(&mut self, now: Timestamp) {
        self.last_sync_at = Some(now);
    }
}
