//! PendingLog - the ordered list of mutations awaiting delivery.
//!
//! The log only ever appends at the back and is drained from the front, so
//! replay order always equals enqueue order.

use crate::{
    error::Result, ActionClock, ActionId, ActionKind, Error, NodeId, PendingAction, Timestamp,
    MAX_RETRIES,
};
use serde::{Deserialize, Serialize};

/// What happened to an action after a failed replay.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Still queued, with the new retry count.
    Retry(u32),
    /// Retry budget exhausted; the action has been removed from the log.
    Dropped(PendingAction),
}

/// FIFO log of pending actions with retry accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLog {
    clock: ActionClock,
    actions: Vec<PendingAction>,
}

impl PendingLog {
    /// Create an empty log minting ids for `node_id`.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            clock: ActionClock::new(node_id),
            actions: Vec::new(),
        }
    }

    /// Append a new action and return its id.
    pub fn enqueue(
        &mut self,
        kind: ActionKind,
        payload: serde_json::Value,
        now: Timestamp,
    ) -> ActionId {
        let id = self.clock.next_id(now);
        self.actions
            .push(PendingAction::new(id.clone(), kind, payload, now));
        id
    }

    /// All queued actions, oldest first.
    pub fn list(&self) -> &[PendingAction] {
        &self.actions
    }

    /// Look up a queued action.
    pub fn get(&self, id: &str) -> Option<&PendingAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Remove an action. Returns the removed action, if it was queued.
    pub fn remove(&mut self, id: &str) -> Option<PendingAction> {
        let index = self.actions.iter().position(|a| a.id == id)?;
        Some(self.actions.remove(index))
    }

    /// Count one failed replay of `id`.
    ///
    /// The action keeps its position in the queue while it has retries left.
    /// The failure that brings `retry_count` to [`MAX_RETRIES`] removes it.
    pub fn record_failure(&mut self, id: &str) -> Result<FailureOutcome> {
        let index = self
            .actions
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;

        self.actions[index].retry_count += 1;
        let retry_count = self.actions[index].retry_count;

        if retry_count >= MAX_RETRIES {
            Ok(FailureOutcome::Dropped(self.actions.remove(index)))
        } else {
            Ok(FailureOutcome::Retry(retry_count))
        }
    }

    /// Remove every queued action.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Ids of the queued actions, oldest first.
    pub fn ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|a| a.id.clone()).collect()
    }

    /// Replace the queue with persisted actions.
    ///
    /// The id clock is advanced past the restored actions so new ids cannot
    /// collide with them. Restored actions that already exhausted their
    /// retries are discarded.
    pub fn restore(&mut self, actions: Vec<PendingAction>) {
        let highest = actions
            .iter()
            .filter_map(|a| a.id.rsplit('-').next()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let restored = actions.len() as u64;

        self.actions = actions
            .into_iter()
            .filter(|a| a.retry_count < MAX_RETRIES)
            .collect();
        self.clock.counter = self.clock.counter.max(highest).saturating_add(restored);
    }

    /// Serialize the queued actions as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.actions).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Parse a JSON array of actions written by [`PendingLog::to_json`].
    pub fn actions_from_json(json: &str) -> Result<Vec<PendingAction>> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub(crate) fn clock(&self) -> &ActionClock {
        &self.clock
    }

    pub(crate) fn restore_clock(&mut self, clock: ActionClock) {
        self.clock.merge(&clock);
    }
}
