//! Time-based identifiers for pending actions.
//!
//! Ids combine the enqueue time with the device id and a per-device counter,
//! so two actions minted in the same millisecond never collide.

use crate::{ActionId, NodeId, Timestamp};
use serde::{Deserialize, Serialize};

/// Mints unique, time-based action ids.
///
/// The counter only ever grows, including across a snapshot restore, which
/// keeps ids unique even when the wall clock moves backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionClock {
    /// Identifier of the device minting ids
    pub node_id: NodeId,
    /// Monotonically increasing counter
    pub counter: u64,
}

impl ActionClock {
    /// Create a new clock for a node, starting at counter 0.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            counter: 0,
        }
    }

    /// Create a clock with a specific counter value.
    pub fn with_counter(node_id: impl Into<NodeId>, counter: u64) -> Self {
        Self {
            node_id: node_id.into(),
            counter,
        }
    }

    /// Mint the next id for an action enqueued at `now`.
    pub fn next_id(&mut self, now: Timestamp) -> ActionId {
        self.counter += 1;
        format!("{}-{}-{}", now, self.node_id, self.counter)
    }

    /// Advance the counter to at least `other`'s counter.
    pub fn merge(&mut self, other: &ActionClock) {
        self.counter = self.counter.max(other.counter);
    }
}
