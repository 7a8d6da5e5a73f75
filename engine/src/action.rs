//! Pending user mutations awaiting network delivery.

use crate::{ActionId, Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of failed replays after which an action is dropped.
pub const MAX_RETRIES: u32 = 3;

/// The kinds of mutation that can be queued while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Booking,
    Message,
    Favorite,
    Review,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Booking,
        ActionKind::Message,
        ActionKind::Favorite,
        ActionKind::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Booking => "booking",
            ActionKind::Message => "message",
            ActionKind::Favorite => "favorite",
            ActionKind::Review => "review",
        }
    }

    /// Path the action is replayed against with a POST.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ActionKind::Booking => "/api/bookings",
            ActionKind::Message => "/api/messages",
            ActionKind::Favorite => "/api/favorites",
            ActionKind::Review => "/api/reviews",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(ActionKind::Booking),
            "message" => Ok(ActionKind::Message),
            "favorite" => Ok(ActionKind::Favorite),
            "review" => Ok(ActionKind::Review),
            other => Err(Error::UnknownActionKind(other.to_string())),
        }
    }
}

/// A queued mutation.
///
/// `retry_count` stays below [`MAX_RETRIES`] for as long as the action is
/// held by a [`crate::PendingLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: ActionId,
    pub kind: ActionKind,
    /// Request body for the kind's endpoint
    pub payload: serde_json::Value,
    pub enqueued_at: Timestamp,
    pub retry_count: u32,
}

impl PendingAction {
    pub fn new(
        id: impl Into<ActionId>,
        kind: ActionKind,
        payload: serde_json::Value,
        enqueued_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
            enqueued_at,
            retry_count: 0,
        }
    }

    /// Whether one more failure would exhaust the action.
    pub fn is_last_attempt(&self) -> bool {
        self.retry_count + 1 >= MAX_RETRIES
    }
}
