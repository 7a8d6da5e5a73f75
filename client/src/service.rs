//! Composition root for the offline layer.
//!
//! [`OfflineService`] owns one instance of every component and is handed to
//! call sites explicitly; there is no process-global state.

use std::sync::Arc;
use std::time::Duration;

use berth_engine::{ActionId, ActionKind, CollectionName, SyncStatus, Timestamp};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::api::SyncApi;
use crate::cache::LocalCacheStore;
use crate::config::{Config, DEFAULT_SYNC_INTERVAL};
use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::coordinator::SyncCoordinator;
use crate::error::Result;
use crate::events::{EventBus, SyncEvent};
use crate::mode::{ModeController, SyncTrigger};
use crate::now_millis;
use crate::pending::PendingActionLog;
use crate::storage::KeyValueStore;

/// Result of a mutation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Sent immediately; carries the server's response.
    Sent(serde_json::Value),
    /// Queued for replay on reconnect.
    Queued(ActionId),
}

impl Submission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}

/// Builder for [`OfflineService`].
pub struct OfflineServiceBuilder {
    api: Arc<dyn SyncApi>,
    storage: Arc<dyn KeyValueStore>,
    device_id: String,
    sync_interval: Duration,
}

impl OfflineServiceBuilder {
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Wire the components together.
    ///
    /// Returns the service and the trigger receiver that
    /// [`OfflineService::run`] consumes.
    pub fn build(self) -> (OfflineService, mpsc::UnboundedReceiver<SyncTrigger>) {
        let events = EventBus::new();
        let cache = LocalCacheStore::new(self.storage.clone());
        let pending = Arc::new(PendingActionLog::open(self.storage, &self.device_id));

        let (mode, triggers) = ModeController::new(events.clone());
        if let Some(at) = cache.last_sync() {
            mode.mark_synced(at);
        }
        let mode = Arc::new(mode);

        let coordinator = Arc::new(SyncCoordinator::new(
            self.api.clone(),
            cache.clone(),
            pending.clone(),
            mode.clone(),
            events.clone(),
            self.sync_interval,
        ));

        let service = OfflineService {
            api: self.api,
            cache,
            pending,
            mode,
            coordinator,
            connectivity: ConnectivityMonitor::new_shared(),
            events,
        };
        (service, triggers)
    }
}

/// Snapshot of the offline layer for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(flatten)]
    pub sync: SyncStatus,
    /// `last_sync_at` as RFC 3339, for humans.
    pub last_sync: Option<String>,
}

#[derive(Clone)]
pub struct OfflineService {
    api: Arc<dyn SyncApi>,
    cache: LocalCacheStore,
    pending: Arc<PendingActionLog>,
    mode: Arc<ModeController>,
    coordinator: Arc<SyncCoordinator>,
    connectivity: Arc<ConnectivityMonitor>,
    events: EventBus,
}

impl OfflineService {
    pub fn builder(api: Arc<dyn SyncApi>, storage: Arc<dyn KeyValueStore>) -> OfflineServiceBuilder {
        OfflineServiceBuilder {
            api,
            storage,
            device_id: "local".to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    /// Build from configuration.
    pub fn from_config(
        config: &Config,
        api: Arc<dyn SyncApi>,
        storage: Arc<dyn KeyValueStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SyncTrigger>) {
        Self::builder(api, storage)
            .device_id(config.device_id.clone())
            .sync_interval(config.sync_interval)
            .build()
    }

    pub fn cache(&self) -> &LocalCacheStore {
        &self.cache
    }

    pub fn pending(&self) -> &PendingActionLog {
        &self.pending
    }

    pub fn mode(&self) -> &ModeController {
        &self.mode
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    /// Drive the mode from connectivity transitions.
    pub fn follow_connectivity(&self) -> Subscription {
        let mode = self.mode.clone();
        self.connectivity.on_connectivity_change(move |status| {
            mode.apply(status);
        })
    }

    /// Run the sync loop until `shutdown` resolves.
    pub async fn run<F>(&self, triggers: mpsc::UnboundedReceiver<SyncTrigger>, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        self.coordinator.run(triggers, shutdown).await;
    }

    /// Send a mutation now, or queue it while offline.
    ///
    /// An online failure is returned to the caller rather than queued.
    pub async fn submit(&self, kind: ActionKind, payload: serde_json::Value) -> Result<Submission> {
        if self.mode.is_offline_mode() {
            return Ok(Submission::Queued(self.pending.enqueue(kind, payload)));
        }

        let response = self.api.submit(kind, payload).await?;
        tracing::debug!(kind = %kind, "Action sent directly");
        Ok(Submission::Sent(response))
    }

    pub async fn create_booking(&self, booking: serde_json::Value) -> Result<Submission> {
        self.submit(ActionKind::Booking, booking).await
    }

    pub async fn send_message(&self, message: serde_json::Value) -> Result<Submission> {
        self.submit(ActionKind::Message, message).await
    }

    pub async fn add_favorite(&self, favorite: serde_json::Value) -> Result<Submission> {
        self.submit(ActionKind::Favorite, favorite).await
    }

    pub async fn submit_review(&self, review: serde_json::Value) -> Result<Submission> {
        self.submit(ActionKind::Review, review).await
    }

    /// Queue a mutation regardless of mode.
    pub fn queue_action(&self, kind: ActionKind, payload: serde_json::Value) -> ActionId {
        self.pending.enqueue(kind, payload)
    }

    /// Items for a screen.
    ///
    /// Offline, this is the cached copy. Online, the collection is pulled and
    /// cached; a failed pull is returned so the caller can offer a retry,
    /// with [`OfflineService::cached`] as the fallback.
    pub async fn load(&self, name: CollectionName) -> Result<Vec<serde_json::Value>> {
        if self.mode.is_offline_mode() {
            return Ok(self.cache.read_collection(name));
        }

        let items = self.api.fetch_collection(name).await?;
        self.cache.write_collection(name, items.clone());
        Ok(items)
    }

    /// Cached items, without touching the network.
    pub fn cached(&self, name: CollectionName) -> Vec<serde_json::Value> {
        self.cache.read_collection(name)
    }

    /// Drop every cached collection and every queued action.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.pending.clear();
        self.mode.clear_last_sync();
        tracing::info!("Offline cache cleared");
    }

    pub fn status(&self) -> ServiceStatus {
        self.status_at(now_millis())
    }

    pub fn status_at(&self, now: Timestamp) -> ServiceStatus {
        let state = self.mode.snapshot();
        let stale_collections = CollectionName::ALL
            .into_iter()
            .filter(|name| self.cache.is_stale_at(*name, now))
            .collect();

        let last_sync = state.last_sync_at.and_then(|ms| {
            chrono::DateTime::from_timestamp_millis(i64::try_from(ms).ok()?).map(|t| t.to_rfc3339())
        });

        ServiceStatus {
            sync: SyncStatus {
                is_offline: state.is_offline,
                last_sync_at: state.last_sync_at,
                pending_count: self.pending.len(),
                stale_collections,
            },
            last_sync,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;

    struct EchoApi;

    impl SyncApi for EchoApi {
        fn fetch_collection(&self, name: CollectionName) -> BoxFuture<'_, Result<Vec<serde_json::Value>>> {
            async move { Ok(vec![json!({"from": name.as_str()})]) }.boxed()
        }

        fn submit(
            &self,
            _kind: ActionKind,
            payload: serde_json::Value,
        ) -> BoxFuture<'_, Result<serde_json::Value>> {
            async move { Ok(payload) }.boxed()
        }

        fn ping(&self) -> BoxFuture<'_, Result<()>> {
            async { Ok(()) }.boxed()
        }
    }

    fn service() -> OfflineService {
        OfflineService::builder(Arc::new(EchoApi), Arc::new(MemoryStore::new()))
            .device_id("phone")
            .build()
            .0
    }

    #[tokio::test]
    async fn load_caches_online_and_reads_cache_offline() {
        let service = service();
        let items = service.load(CollectionName::Boats).await.unwrap();
        assert_eq!(items, vec![json!({"from": "boats"})]);

        service.mode().set_offline_mode(true);
        assert_eq!(service.load(CollectionName::Boats).await.unwrap(), items);
        assert!(service.load(CollectionName::Messages).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_reports_pending_and_staleness() {
        let service = service();
        service.queue_action(ActionKind::Review, json!({"rating": 4}));
        service.cache().write_collection_at(CollectionName::Boats, vec![], 0);
        service.cache().mark_synced(0);

        let status = service.status_at(1000);
        assert_eq!(status.sync.pending_count, 1);
        assert!(!status.sync.is_offline);
        assert_eq!(
            status.sync.stale_collections,
            vec![CollectionName::Bookings, CollectionName::Messages]
        );
    }

    #[test]
    fn last_sync_is_restored_on_build() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        LocalCacheStore::new(storage.clone()).mark_synced(1706745600000);

        let (service, _rx) = OfflineService::builder(Arc::new(EchoApi), storage).build();
        let status = service.status();
        assert_eq!(status.sync.last_sync_at, Some(1706745600000));
        assert_eq!(status.last_sync.as_deref(), Some("2024-02-01T00:00:00+00:00"));
    }

    #[test]
    fn connectivity_drives_mode() {
        let service = service();
        let _sub = service.follow_connectivity();

        service
            .connectivity()
            .report(crate::connectivity::NetworkStatus::Disconnected);
        assert!(service.mode().is_offline_mode());
    }
}
