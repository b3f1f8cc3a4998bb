use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showlink_client::{
    run_sync_loop, ConnectionManager, MediaLoader, MediaSession, PlaybackReconciler,
    ReconnectPolicy, SessionStore,
};
use showlink_shared_config::CommonConfig;

mod view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showlink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = CommonConfig::from_env()?;
    tracing::info!(
        environment = %config.environment,
        endpoint = %config.server.endpoint,
        "starting Showlink console"
    );

    let policy = ReconnectPolicy {
        max_attempts: config.sync.max_reconnect_attempts,
        base_delay: config.sync.reconnect_delay(),
        handshake_timeout: Duration::from_secs(config.server.handshake_timeout_secs),
    };
    let manager = ConnectionManager::new(config.server.endpoint.clone(), policy);
    let store = SessionStore::new(manager.clone(), config.sync.poll_interval());
    manager.connect();

    let loader = MediaLoader::new(config.media.clone());
    let reconciler = Arc::new(Mutex::new(PlaybackReconciler::new(
        MediaSession::new(),
        manager.clone(),
        config.sync.seek_tolerance_secs,
    )));

    let sync_task = tokio::spawn(run_sync_loop(
        Arc::clone(&reconciler),
        loader,
        store.subscribe(),
        config.sync.observe_interval(),
    ));

    view::run(&store, &reconciler).await?;

    sync_task.abort();
    manager.disconnect();
    tracing::info!("console session ended");
    Ok(())
}
