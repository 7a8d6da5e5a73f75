//! Berth Sync - headless offline sync agent.
//!
//! Mirrors the user's collections into a local directory and replays queued
//! actions whenever the API becomes reachable.

use std::sync::Arc;

use berth_client::{Config, FileStore, HttpApi, OfflineService, SyncApi};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "berth_client=debug,berth_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        api_url = %config.api_url,
        storage_dir = %config.storage_dir.display(),
        "Starting Berth sync agent"
    );

    let storage = Arc::new(FileStore::open(&config.storage_dir)?);
    let api: Arc<dyn SyncApi> = Arc::new(HttpApi::from_config(&config)?);

    let (service, triggers) = OfflineService::from_config(&config, api.clone(), storage);
    tracing::info!(pending = service.pending().len(), "Offline state restored");

    let _connectivity = service.follow_connectivity();
    let probe = service
        .connectivity()
        .spawn_probe(api, config.probe_interval);

    let mut events = service.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(?event, "Sync event"),
                Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    service
        .run(triggers, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await;

    probe.abort();
    event_log.abort();

    let status = service.status();
    tracing::info!(
        pending = status.sync.pending_count,
        last_sync = status.last_sync.as_deref().unwrap_or("never"),
        "Shut down"
    );

    Ok(())
}
