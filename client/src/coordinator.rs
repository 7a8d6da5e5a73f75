//! Pulls collections into the cache and replays queued actions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use berth_engine::{ActionId, CollectionName, FailureOutcome, Mode, PendingAction};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;

use crate::api::SyncApi;
use crate::cache::LocalCacheStore;
use crate::events::{EventBus, SyncEvent};
use crate::mode::{ModeController, SyncTrigger};
use crate::now_millis;
use crate::pending::PendingActionLog;

/// Outcome of one [`SyncCoordinator::sync_collections`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub refreshed: Vec<CollectionName>,
    pub failed: Vec<CollectionName>,
    /// The pass was skipped because the client is offline.
    pub skipped: bool,
}

/// Outcome of one [`SyncCoordinator::drain_pending_actions`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub delivered: Vec<ActionId>,
    pub retried: Vec<ActionId>,
    pub dropped: Vec<PendingAction>,
    /// The client went offline before the queue was fully visited.
    pub interrupted: bool,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.retried.len() + self.dropped.len()
    }
}

pub struct SyncCoordinator {
    api: Arc<dyn SyncApi>,
    cache: LocalCacheStore,
    pending: Arc<PendingActionLog>,
    mode: Arc<ModeController>,
    events: EventBus,
    sync_interval: Duration,
    /// Serializes drains so one action is never in flight twice.
    drain_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        api: Arc<dyn SyncApi>,
        cache: LocalCacheStore,
        pending: Arc<PendingActionLog>,
        mode: Arc<ModeController>,
        events: EventBus,
        sync_interval: Duration,
    ) -> Self {
        Self {
            api,
            cache,
            pending,
            mode,
            events,
            sync_interval,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// Pull every collection and overwrite its cache entry.
    ///
    /// Each collection is independent: a failed pull is logged and leaves the
    /// previous cache entry in place.
    pub async fn sync_collections(&self) -> PullReport {
        let mut report = PullReport::default();

        for name in CollectionName::ALL {
            if self.mode.is_offline_mode() {
                tracing::debug!(collection = %name, "Offline, skipping pull");
                report.skipped = true;
                break;
            }

            match self.api.fetch_collection(name).await {
                Ok(items) => {
                    let count = items.len();
                    self.cache.write_collection(name, items);
                    self.events.publish(SyncEvent::CollectionRefreshed { name, items: count });
                    report.refreshed.push(name);
                }
                Err(e) => {
                    tracing::warn!(collection = %name, error = %e, "Pull failed, keeping cached copy");
                    report.failed.push(name);
                }
            }
        }

        if !report.refreshed.is_empty() {
            let now = now_millis();
            self.cache.mark_synced(now);
            self.mode.mark_synced(now);
        }

        tracing::info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Collection sync finished"
        );
        report
    }

    /// Replay queued actions against the API.
    ///
    /// Successes leave the log. A failure bumps the action's retry count, or
    /// drops it on the final attempt, and the drain moves on to the next one.
    pub async fn drain_pending_actions(&self) -> DrainReport {
        let _guard = self.drain_lock.lock().await;
        let mut report = DrainReport::default();

        // Strictly one at a time in enqueue order. Later actions may refer to
        // earlier ones, so ordering on the server wins over throughput.
        for id in self.pending.ids() {
            // Mode may have changed during the previous await.
            if self.mode.is_offline_mode() {
                tracing::debug!(remaining = self.pending.len(), "Offline, pausing drain");
                report.interrupted = true;
                break;
            }

            // Re-read from the live log; a clear may have run meanwhile.
            let Some(action) = self.pending.get(&id) else {
                continue;
            };

            match self.api.submit(action.kind, action.payload.clone()).await {
                Ok(_) => {
                    if self.pending.remove(&action.id).is_none() {
                        tracing::debug!(action_id = %action.id, "Action left the log during replay");
                        continue;
                    }
                    tracing::info!(action_id = %action.id, kind = %action.kind, "Action delivered");
                    self.events.publish(SyncEvent::ActionDelivered { id: action.id.clone() });
                    report.delivered.push(action.id);
                }
                Err(e) => self.handle_failure(&action, &e, &mut report),
            }
        }

        report
    }

    fn handle_failure(
        &self,
        action: &PendingAction,
        error: &crate::error::ClientError,
        report: &mut DrainReport,
    ) {
        match self.pending.record_failure(&action.id) {
            Ok(FailureOutcome::Retry(retry_count)) => {
                tracing::warn!(
                    action_id = %action.id,
                    kind = %action.kind,
                    retry_count,
                    transient = error.is_transient(),
                    error = %error,
                    "Replay failed, will retry"
                );
                self.events.publish(SyncEvent::ActionRetried {
                    id: action.id.clone(),
                    retry_count,
                });
                report.retried.push(action.id.clone());
            }
            Ok(FailureOutcome::Dropped(dropped)) => {
                tracing::warn!(
                    action_id = %dropped.id,
                    kind = %dropped.kind,
                    transient = error.is_transient(),
                    error = %error,
                    "Replay failed for the last time, dropping action"
                );
                self.events.publish(SyncEvent::ActionDropped {
                    action: dropped.clone(),
                });
                report.dropped.push(dropped);
            }
            // Cleared while the request was in flight.
            Err(e) => {
                tracing::debug!(action_id = %action.id, error = %e, "Action left the log during replay");
            }
        }
    }

    /// Replay the queue, then refresh the cache.
    pub async fn sync_now(&self) -> (DrainReport, PullReport) {
        let drained = self.drain_pending_actions().await;
        let pulled = self.sync_collections().await;
        (drained, pulled)
    }

    /// Run until `shutdown` resolves.
    ///
    /// Syncs once per trigger and every `sync_interval` while online. The
    /// periodic timer is paused while offline and restarts on reconnect.
    pub async fn run<F>(&self, mut triggers: mpsc::UnboundedReceiver<SyncTrigger>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut mode_rx = self.mode.watch_mode();
        let mut ticker = tokio::time::interval(self.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.sync_interval.as_secs(), "Sync coordinator started");

        loop {
            let online = *mode_rx.borrow_and_update() == Mode::Online;

            tokio::select! {
                _ = &mut shutdown => break,
                Some(SyncTrigger) = triggers.recv() => {
                    self.sync_now().await;
                    ticker.reset();
                }
                _ = ticker.tick(), if online => {
                    self.sync_now().await;
                }
                // Restart the period so a reconnect syncs once, via its trigger.
                Ok(()) = mode_rx.changed() => ticker.reset(),
            }
        }

        tracing::info!("Sync coordinator stopped");
    }
}
