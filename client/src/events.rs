//! Notifications for the UI layer.
//!
//! Events are fire-and-forget: with no subscribers, or with a subscriber
//! that lags behind, they are discarded.

use berth_engine::{ActionId, CollectionName, Mode, PendingAction};
use tokio::sync::broadcast;

/// Capacity of the event channel.
pub const EVENT_CAPACITY: usize = 256;

/// Something the sync layer did that a UI may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The online/offline mode changed.
    ModeChanged(Mode),
    /// A collection was pulled and written to the cache.
    CollectionRefreshed { name: CollectionName, items: usize },
    /// A queued action reached the server and left the log.
    ActionDelivered { id: ActionId },
    /// A replay failed; the action stays queued.
    ActionRetried { id: ActionId, retry_count: u32 },
    /// A replay failed for the last time; the action was discarded.
    ActionDropped { action: PendingAction },
}

/// Sender half shared by the components that publish events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: SyncEvent) {
        // An error only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(SyncEvent::ModeChanged(Mode::Offline));
        assert_eq!(rx.recv().await.unwrap(), SyncEvent::ModeChanged(Mode::Offline));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::new().publish(SyncEvent::ActionDelivered { id: "a".into() });
    }
}
