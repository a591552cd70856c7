use sink::handlers::default_registry;
use sink::pipeline::Sink;
use sink::store::PgStore;
use sink_config::shared::SinkConfig;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use crate::error::ServiceResult;
use crate::health::run_health_server;

/// Runs the sink with the Postgres store until a shutdown signal or a fatal error.
pub async fn start_sink_with_config(config: SinkConfig) -> ServiceResult<()> {
    let registry = default_registry(&config.tables)?;
    info!(message_types = ?registry.message_types(), "handlers registered");

    let health_server = run_health_server(&config.health)?;
    let health_handle = health_server.handle();
    let health_task = tokio::spawn(health_server);

    let store = PgStore::new(config.store.clone());
    let mut sink = Sink::new(config, store, registry);
    sink.start().await?;

    let shutdown_tx = sink.shutdown_tx();
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown_task = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, shutting down sink");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down sink");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = %err, "failed to send shutdown signal");
        }
    });

    let result = sink.wait().await;

    // Both consumers stopped, a pending signal listener has nothing left to stop.
    shutdown_task.abort();
    let _ = shutdown_task.await;

    health_handle.stop(true).await;
    match health_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "health endpoint failed"),
        Err(err) => warn!(error = %err, "health endpoint task failed"),
    }

    result?;

    info!("sink stopped");

    Ok(())
}
