//! Persistent log of mutations waiting for network delivery.

use std::sync::{Arc, Mutex, MutexGuard};

use berth_engine::{
    ActionId, ActionKind, FailureOutcome, PendingAction, PendingLog, Timestamp,
    PENDING_ACTIONS_KEY,
};

use crate::error::Result;
use crate::now_millis;
use crate::storage::KeyValueStore;

/// FIFO log of pending actions, persisted under `pending_actions`.
///
/// The in-memory log is authoritative for the running process. Every
/// mutation rewrites the persisted copy; if that write fails the action is
/// still held in memory and the failure is logged.
pub struct PendingActionLog {
    storage: Arc<dyn KeyValueStore>,
    log: Mutex<PendingLog>,
}

impl PendingActionLog {
    /// Open the log, restoring any actions persisted by a previous run.
    pub fn open(storage: Arc<dyn KeyValueStore>, device_id: &str) -> Self {
        let mut log = PendingLog::new(device_id);

        match storage.get(PENDING_ACTIONS_KEY) {
            Ok(Some(json)) => match PendingLog::actions_from_json(&json) {
                Ok(actions) => {
                    tracing::info!(count = actions.len(), "Restored pending actions");
                    log.restore(actions);
                }
                Err(e) => tracing::warn!(error = %e, "Discarding unreadable pending actions"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read pending actions"),
        }

        Self {
            storage,
            log: Mutex::new(log),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, log: &PendingLog) -> Result<()> {
        let json = log.to_json()?;
        self.storage.set(PENDING_ACTIONS_KEY, &json)?;
        Ok(())
    }

    fn persist(&self, log: &PendingLog) {
        if let Err(e) = self.write(log) {
            tracing::warn!(error = %e, pending = log.len(), "Failed to persist pending actions");
        }
    }

    /// Append a new action and return its id.
    pub fn enqueue(&self, kind: ActionKind, payload: serde_json::Value) -> ActionId {
        self.enqueue_at(kind, payload, now_millis())
    }

    pub fn enqueue_at(
        &self,
        kind: ActionKind,
        payload: serde_json::Value,
        now: Timestamp,
    ) -> ActionId {
        let mut log = self.lock();
        let id = log.enqueue(kind, payload, now);
        self.persist(&log);
        tracing::info!(action_id = %id, kind = %kind, pending = log.len(), "Action queued");
        id
    }

    /// Snapshot of the queue, oldest first.
    pub fn list_pending(&self) -> Vec<PendingAction> {
        self.lock().list().to_vec()
    }

    /// Ids of the queued actions, oldest first.
    pub fn ids(&self) -> Vec<ActionId> {
        self.lock().ids()
    }

    pub fn get(&self, id: &str) -> Option<PendingAction> {
        self.lock().get(id).cloned()
    }

    /// Remove an action after delivery.
    pub fn remove(&self, id: &str) -> Option<PendingAction> {
        let mut log = self.lock();
        let removed = log.remove(id);
        if removed.is_some() {
            self.persist(&log);
        }
        removed
    }

    /// Count a failed replay; drops the action once its retries run out.
    pub fn record_failure(&self, id: &str) -> Result<FailureOutcome> {
        let mut log = self.lock();
        let outcome = log.record_failure(id)?;
        self.persist(&log);
        Ok(outcome)
    }

    /// Remove every queued action.
    pub fn clear(&self) {
        let mut log = self.lock();
        log.clear();
        if let Err(e) = self.storage.remove(PENDING_ACTIONS_KEY) {
            tracing::warn!(error = %e, "Failed to remove persisted pending actions");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
