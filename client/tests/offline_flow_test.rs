//! End-to-end behavior of the offline layer against an in-process API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use berth_client::{
    ClientError, KeyValueStore, MemoryStore, NetworkStatus, OfflineService, Result, Submission,
    SyncApi, SyncEvent,
};
use berth_engine::{ActionKind, CollectionName, MAX_RETRIES};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

/// Records every call in order and fails on demand.
#[derive(Default)]
struct MockApi {
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<Value>>,
    pulls: Mutex<HashMap<CollectionName, usize>>,
    failing_pulls: Mutex<HashSet<CollectionName>>,
    fail_submits: AtomicBool,
    on_first_submit: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockApi {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn submitted(&self) -> Vec<Value> {
        self.submitted.lock().unwrap().clone()
    }

    fn pull_count(&self, name: CollectionName) -> usize {
        self.pulls.lock().unwrap().get(&name).copied().unwrap_or(0)
    }

    fn fail_pull(&self, name: CollectionName) {
        self.failing_pulls.lock().unwrap().insert(name);
    }
}

impl SyncApi for MockApi {
    fn fetch_collection(&self, name: CollectionName) -> BoxFuture<'_, Result<Vec<Value>>> {
        self.calls.lock().unwrap().push(format!("GET {}", name));
        let round = {
            let mut pulls = self.pulls.lock().unwrap();
            let n = pulls.entry(name).or_insert(0);
            *n += 1;
            *n
        };
        let fail = self.failing_pulls.lock().unwrap().contains(&name);

        async move {
            if fail {
                return Err(ClientError::Status { status: 503, body: "unavailable".into() });
            }
            Ok(vec![json!({"collection": name.as_str(), "round": round})])
        }
        .boxed()
    }

    fn submit(&self, kind: ActionKind, payload: Value) -> BoxFuture<'_, Result<Value>> {
        let hook = self.on_first_submit.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.calls.lock().unwrap().push(format!("POST {}", kind.endpoint()));
        let fail = self.fail_submits.load(Ordering::SeqCst);
        if !fail {
            self.submitted.lock().unwrap().push(payload.clone());
        }

        async move {
            if fail {
                return Err(ClientError::Status { status: 500, body: "boom".into() });
            }
            Ok(json!({"id": 1, "echo": payload}))
        }
        .boxed()
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }
}

fn setup() -> (OfflineService, Arc<MockApi>) {
    let api = Arc::new(MockApi::default());
    let (service, _triggers) =
        OfflineService::builder(api.clone(), Arc::new(MemoryStore::new()))
            .device_id("test-device")
            .build();
    (service, api)
}

#[tokio::test]
async fn test_fifo_replay() {
    let (service, api) = setup();
    service.mode().set_offline_mode(true);

    let kinds = [
        ActionKind::Booking,
        ActionKind::Message,
        ActionKind::Message,
        ActionKind::Favorite,
        ActionKind::Review,
        ActionKind::Message,
    ];
    let mut expected = Vec::new();
    for (seq, kind) in kinds.iter().enumerate() {
        let payload = json!({"seq": seq});
        let submission = service.submit(*kind, payload.clone()).await.unwrap();
        assert!(submission.is_queued());
        expected.push(payload);
    }

    service.mode().set_offline_mode(false);
    let report = service.coordinator().drain_pending_actions().await;

    assert_eq!(report.delivered.len(), kinds.len());
    assert_eq!(api.submitted(), expected);
    assert!(service.pending().is_empty());
}

#[tokio::test]
async fn test_retry_exhaustion() {
    let (service, api) = setup();
    api.fail_submits.store(true, Ordering::SeqCst);
    let id = service.queue_action(ActionKind::Booking, json!({"boatId": 7}));

    for attempt in 1..MAX_RETRIES {
        let report = service.coordinator().drain_pending_actions().await;
        assert_eq!(report.retried, vec![id.clone()]);
        let action = service.pending().get(&id).expect("still queued");
        assert_eq!(action.retry_count, attempt);
    }

    let report = service.coordinator().drain_pending_actions().await;
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].id, id);
    assert!(service.pending().get(&id).is_none());
    assert_eq!(api.calls().len(), MAX_RETRIES as usize);
}

#[tokio::test]
async fn test_dropped_action_is_announced() {
    let (service, api) = setup();
    let mut events = service.subscribe();
    api.fail_submits.store(true, Ordering::SeqCst);
    let id = service.queue_action(ActionKind::Review, json!({"rating": 1}));

    for _ in 0..MAX_RETRIES {
        service.coordinator().drain_pending_actions().await;
    }

    let mut dropped = None;
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::ActionDropped { action } = event {
            dropped = Some(action);
        }
    }
    assert_eq!(dropped.map(|a| a.id), Some(id));
}

#[tokio::test]
async fn test_one_failure_does_not_block_the_rest() {
    let (service, api) = setup();
    service.queue_action(ActionKind::Booking, json!({"seq": 0}));
    service.queue_action(ActionKind::Message, json!({"seq": 1}));

    api.fail_submits.store(true, Ordering::SeqCst);
    let report = service.coordinator().drain_pending_actions().await;
    assert_eq!(report.retried.len(), 2);

    api.fail_submits.store(false, Ordering::SeqCst);
    let report = service.coordinator().drain_pending_actions().await;
    assert_eq!(report.delivered.len(), 2);
    assert_eq!(api.submitted(), vec![json!({"seq": 0}), json!({"seq": 1})]);
}

#[tokio::test]
async fn test_cache_last_write_wins() {
    let (service, _api) = setup();

    service.coordinator().sync_collections().await;
    service.coordinator().sync_collections().await;

    assert_eq!(
        service.cached(CollectionName::Boats),
        vec![json!({"collection": "boats", "round": 2})]
    );
}

#[tokio::test]
async fn test_offline_enqueues_without_network() {
    let (service, api) = setup();
    service.mode().set_offline_mode(true);

    let submission = service.create_booking(json!({"boatId": 3})).await.unwrap();

    let pending = service.pending().list_pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, ActionKind::Booking);
    assert_eq!(submission, Submission::Queued(pending[0].id.clone()));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_online_calls_directly() {
    let (service, api) = setup();

    let submission = service.create_booking(json!({"boatId": 3})).await.unwrap();

    assert!(matches!(submission, Submission::Sent(_)));
    assert!(service.pending().is_empty());
    assert_eq!(api.calls(), vec!["POST /api/bookings".to_string()]);
}

#[tokio::test]
async fn test_online_failure_is_surfaced() {
    let (service, api) = setup();
    api.fail_submits.store(true, Ordering::SeqCst);

    let err = service.send_message(json!({"text": "hi"})).await.unwrap_err();
    assert!(err.is_transient());
    assert!(service.pending().is_empty());
}

#[tokio::test]
async fn test_reconnect_triggers_one_sync() {
    let api = Arc::new(MockApi::default());
    let (service, triggers) = OfflineService::builder(api.clone(), Arc::new(MemoryStore::new()))
        .sync_interval(Duration::from_secs(300))
        .build();
    let _sub = service.follow_connectivity();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let runner = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .run(triggers, async {
                    let _ = stop_rx.await;
                })
                .await;
        })
    };

    // The loop syncs once on start.
    tokio::time::timeout(Duration::from_secs(5), async {
        while api.pull_count(CollectionName::Messages) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("startup sync");

    let monitor = service.connectivity();
    monitor.report(NetworkStatus::Disconnected);
    monitor.report(NetworkStatus::Connected);
    monitor.report(NetworkStatus::Connected);
    service.mode().set_offline_mode(false);

    tokio::time::timeout(Duration::from_secs(5), async {
        while api.pull_count(CollectionName::Messages) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reconnect sync");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(api.pull_count(CollectionName::Boats), 2);
    assert_eq!(api.pull_count(CollectionName::Messages), 2);

    stop_tx.send(()).unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_partial_pull_failure_is_isolated() {
    let (service, api) = setup();
    service.coordinator().sync_collections().await;
    let boats_before = service.cached(CollectionName::Boats);

    api.fail_pull(CollectionName::Boats);
    let report = service.coordinator().sync_collections().await;

    assert_eq!(report.failed, vec![CollectionName::Boats]);
    assert_eq!(service.cached(CollectionName::Boats), boats_before);
    assert_eq!(
        service.cached(CollectionName::Bookings),
        vec![json!({"collection": "bookings", "round": 2})]
    );
    assert_eq!(
        service.cached(CollectionName::Messages),
        vec![json!({"collection": "messages", "round": 2})]
    );
}

#[tokio::test]
async fn test_clear_is_total() {
    let storage = Arc::new(MemoryStore::new());
    let api = Arc::new(MockApi::default());
    let (service, _triggers) = OfflineService::builder(api, storage.clone()).build();

    service.coordinator().sync_collections().await;
    service.queue_action(ActionKind::Favorite, json!({"boatId": 1}));
    service.queue_action(ActionKind::Message, json!({"text": "hi"}));

    service.clear_cache();

    assert!(service.pending().list_pending().is_empty());
    for name in CollectionName::ALL {
        assert!(service.cached(name).is_empty());
    }
    assert!(storage.is_empty(), "no keys left behind: {}", storage.len());
    assert_eq!(storage.get("last_sync").unwrap(), None);
    assert_eq!(service.status().sync.last_sync_at, None);
    assert_eq!(service.status().last_sync, None);
}

#[tokio::test]
async fn test_clear_during_drain_stops_replay() {
    let (service, api) = setup();
    for seq in 0..3 {
        service.queue_action(ActionKind::Message, json!({"seq": seq}));
    }

    let clearing = service.clone();
    *api.on_first_submit.lock().unwrap() = Some(Box::new(move || clearing.clear_cache()));

    let report = service.coordinator().drain_pending_actions().await;

    assert_eq!(api.submitted(), vec![json!({"seq": 0})]);
    assert!(report.delivered.is_empty());
    assert_eq!(report.attempted(), 0);
    assert!(service.pending().is_empty());
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = Arc::new(MockApi::default());

    let (first, _t) = OfflineService::builder(api.clone(), storage.clone())
        .device_id("phone")
        .build();
    first.mode().set_offline_mode(true);
    first.send_message(json!({"text": "one"})).await.unwrap();
    first.send_message(json!({"text": "two"})).await.unwrap();
    drop(first);

    let (second, _t) = OfflineService::builder(api.clone(), storage)
        .device_id("phone")
        .build();
    assert_eq!(second.pending().len(), 2);

    second.coordinator().drain_pending_actions().await;
    assert_eq!(
        api.submitted(),
        vec![json!({"text": "one"}), json!({"text": "two"})]
    );
}
