//! Online/offline mode gate.

use std::sync::{Mutex, MutexGuard};

use berth_engine::{Mode, SyncState, Timestamp, Transition};
use tokio::sync::{mpsc, watch};

use crate::connectivity::NetworkStatus;
use crate::events::{EventBus, SyncEvent};

/// Request for an immediate sync, sent once per OFFLINE to ONLINE change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTrigger;

/// Holds the shared [`SyncState`] and decides queue-vs-send for callers.
///
/// Starts ONLINE. Each OFFLINE to ONLINE change sends exactly one
/// [`SyncTrigger`]; repeated signals for the current mode do nothing.
/// Subscribers of [`ModeController::watch_mode`] use the mode to pause
/// periodic work while offline.
pub struct ModeController {
    state: Mutex<SyncState>,
    triggers: mpsc::UnboundedSender<SyncTrigger>,
    mode_tx: watch::Sender<Mode>,
    events: EventBus,
}

impl ModeController {
    /// Create the controller and the receiving end of its sync triggers.
    pub fn new(events: EventBus) -> (Self, mpsc::UnboundedReceiver<SyncTrigger>) {
        let (triggers, trigger_rx) = mpsc::unbounded_channel();
        let state = SyncState::new();
        let (mode_tx, _) = watch::channel(state.mode());

        let controller = Self {
            state: Mutex::new(state),
            triggers,
            mode_tx,
            events,
        };
        (controller, trigger_rx)
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switch mode. Returns what actually changed.
    pub fn set_offline_mode(&self, offline: bool) -> Transition {
        let (transition, mode) = {
            let mut state = self.lock();
            (state.set_offline(offline), state.mode())
        };

        match transition {
            Transition::Unchanged => return transition,
            Transition::WentOffline => {
                tracing::info!("Switched to offline mode");
            }
            Transition::CameOnline => {
                tracing::info!("Back online, scheduling sync");
                if self.triggers.send(SyncTrigger).is_err() {
                    tracing::warn!("Sync coordinator is not running; trigger dropped");
                }
            }
        }

        self.mode_tx.send_replace(mode);
        self.events.publish(SyncEvent::ModeChanged(mode));
        transition
    }

    /// Apply a connectivity signal.
    pub fn apply(&self, status: NetworkStatus) -> Transition {
        self.set_offline_mode(!status.is_connected())
    }

    pub fn is_offline_mode(&self) -> bool {
        self.lock().is_offline
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode()
    }

    /// Follow mode changes.
    pub fn watch_mode(&self) -> watch::Receiver<Mode> {
        self.mode_tx.subscribe()
    }

    pub fn last_sync_at(&self) -> Option<Timestamp> {
        self.lock().last_sync_at
    }

    pub(crate) fn mark_synced(&self, now: Timestamp) {
        self.lock().mark_synced(now);
    }

    pub(crate) fn clear_last_sync(&self) {
        self.lock().last_sync_at = None;
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SyncState {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<SyncTrigger>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn starts_online() {
        let (mode, _rx) = ModeController::new(EventBus::new());
        assert!(!mode.is_offline_mode());
        assert_eq!(mode.mode(), Mode::Online);
        assert_eq!(mode.last_sync_at(), None);
    }

    #[test]
    fn one_trigger_per_reconnect() {
        let (mode, mut rx) = ModeController::new(EventBus::new());

        assert_eq!(mode.set_offline_mode(true), Transition::WentOffline);
        assert_eq!(mode.set_offline_mode(false), Transition::CameOnline);
        assert_eq!(mode.set_offline_mode(false), Transition::Unchanged);
        assert_eq!(mode.apply(NetworkStatus::Connected), Transition::Unchanged);

        assert_eq!(drain(&mut rx), 1);
    }

    #[test]
    fn initial_online_signal_does_not_trigger() {
        let (mode, mut rx) = ModeController::new(EventBus::new());
        assert_eq!(mode.apply(NetworkStatus::Connected), Transition::Unchanged);
        assert_eq!(drain(&mut rx), 0);
    }

    #[test]
    fn watchers_follow_mode() {
        let (mode, _rx) = ModeController::new(EventBus::new());
        let watcher = mode.watch_mode();

        mode.set_offline_mode(true);
        assert_eq!(*watcher.borrow(), Mode::Offline);
        mode.set_offline_mode(false);
        assert_eq!(*watcher.borrow(), Mode::Online);
    }

    #[tokio::test]
    async fn mode_changes_are_published() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (mode, _triggers) = ModeController::new(events);

        mode.set_offline_mode(true);
        mode.set_offline_mode(true);
        mode.set_offline_mode(false);

        assert_eq!(rx.recv().await.unwrap(), SyncEvent::ModeChanged(Mode::Offline));
        assert_eq!(rx.recv().await.unwrap(), SyncEvent::ModeChanged(Mode::Online));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_last_sync_forgets_sync_time() {
        let (mode, _rx) = ModeController::new(EventBus::new());
        mode.mark_synced(1706745600000);
        mode.clear_last_sync();
        assert_eq!(mode.last_sync_at(), None);
    }

    #[test]
    fn trigger_without_coordinator_is_harmless() {
        let (mode, rx) = ModeController::new(EventBus::new());
        drop(rx);
        mode.set_offline_mode(true);
        assert_eq!(mode.set_offline_mode(false), Transition::CameOnline);
    }
}
