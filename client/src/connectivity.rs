//! Network reachability tracking.
//!
//! Hosts feed raw reachability signals into [`ConnectivityMonitor::report`]
//! (or let [`ConnectivityMonitor::spawn_probe`] poll the backend). Handlers
//! registered with [`ConnectivityMonitor::on_connectivity_change`] see only
//! real transitions; repeated signals with the same status are swallowed.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::api::SyncApi;

/// Reachability of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
}

impl NetworkStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, NetworkStatus::Connected)
    }
}

/// Callback invoked on each reachability transition.
pub type ConnectivityHandler = Arc<dyn Fn(NetworkStatus) + Send + Sync>;

/// Fans reachability transitions out to registered handlers.
#[derive(Default)]
pub struct ConnectivityMonitor {
    /// Last delivered status; `None` until the first signal.
    status: Mutex<Option<NetworkStatus>>,
    handlers: DashMap<String, ConnectivityHandler>,
}

impl ConnectivityMonitor {
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler. It stays registered until the returned
    /// subscription is cancelled or dropped.
    pub fn on_connectivity_change<F>(self: &Arc<Self>, handler: F) -> Subscription
    where
        F: Fn(NetworkStatus) + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        self.handlers.insert(id.clone(), Arc::new(handler));
        tracing::debug!(subscription = %id, "Connectivity handler registered");

        Subscription {
            id,
            monitor: Arc::downgrade(self),
        }
    }

    fn unregister(&self, id: &str) {
        if self.handlers.remove(id).is_some() {
            tracing::debug!(subscription = %id, "Connectivity handler unregistered");
        }
    }

    /// Feed a reachability signal.
    ///
    /// Returns `true` if it was a transition and handlers were invoked.
    pub fn report(&self, status: NetworkStatus) -> bool {
        {
            let mut last = self
                .status
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *last == Some(status) {
                return false;
            }
            *last = Some(status);
        }

        tracing::info!(?status, "Connectivity changed");

        // Handlers may unsubscribe from inside the callback.
        let handlers: Vec<ConnectivityHandler> =
            self.handlers.iter().map(|h| h.value().clone()).collect();
        for handler in handlers {
            handler(status);
        }
        true
    }

    /// The last reported status, if any signal has arrived.
    pub fn status(&self) -> Option<NetworkStatus> {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Poll `api.ping()` every `interval` and report the result.
    pub fn spawn_probe(self: &Arc<Self>, api: Arc<dyn SyncApi>, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let status = match api.ping().await {
                    Ok(()) => NetworkStatus::Connected,
                    Err(e) => {
                        tracing::debug!(error = %e, "Reachability probe failed");
                        NetworkStatus::Disconnected
                    }
                };

                match monitor.upgrade() {
                    Some(monitor) => {
                        monitor.report(status);
                    }
                    None => break,
                }
            }
        })
    }
}

/// Cancellation token for a connectivity handler.
#[must_use = "dropping a subscription unregisters its handler"]
pub struct Subscription {
    id: String,
    monitor: Weak<ConnectivityMonitor>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unregister the handler now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.unregister(&self.id);
        }
    }
}
