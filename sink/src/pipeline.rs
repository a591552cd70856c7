use std::sync::Arc;

use sink_config::shared::SinkConfig;
use tracing::{error, info};

use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::consumer::dead_letter::DeadLetterConsumer;
use crate::consumer::primary::PrimaryConsumer;
use crate::consumer::reconnect::ReconnectionStatus;
use crate::error::SinkResult;
use crate::registry::HandlerRegistry;
use crate::store::Store;
use crate::workers::base::WorkerHandle;
use crate::workers::consumer::ConsumerWorkerHandle;

#[derive(Debug)]
enum SinkState {
    NotStarted,
    Started {
        primary: ConsumerWorkerHandle,
        dead_letter: ConsumerWorkerHandle,
    },
}

/// Statuses of both consumers of a started [`Sink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStatus {
    pub primary: ReconnectionStatus,
    pub dead_letter: ReconnectionStatus,
}

/// Runs the primary and the dead-letter consumer.
///
/// Both consumers own their broker connection and share nothing but the shutdown channel.
#[derive(Debug)]
pub struct Sink<S> {
    config: Arc<SinkConfig>,
    store: S,
    registry: Arc<HandlerRegistry>,
    state: SinkState,
    shutdown_tx: ShutdownTx,
}

impl<S> Sink<S>
where
    S: Store + Clone + Send + Sync + 'static,
    S::Session: Send,
{
    pub fn new(config: SinkConfig, store: S, registry: HandlerRegistry) -> Self {
        // Receivers are obtained through `subscribe` when the consumers start.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            store,
            registry: Arc::new(registry),
            state: SinkState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the consumer statuses, or `None` before [`Sink::start`].
    pub fn status(&self) -> Option<SinkStatus> {
        match &self.state {
            SinkState::NotStarted => None,
            SinkState::Started {
                primary,
                dead_letter,
            } => Some(SinkStatus {
                primary: primary.state(),
                dead_letter: dead_letter.state(),
            }),
        }
    }

    /// Spawns both consumers.
    ///
    /// Returns once the workers are spawned. Connecting to the broker happens inside the
    /// workers, so an unreachable broker does not fail this call.
    pub async fn start(&mut self) -> SinkResult<()> {
        if matches!(self.state, SinkState::Started { .. }) {
            info!("sink already started");

            return Ok(());
        }

        info!(
            primary_queue = %self.config.topology.primary_queue,
            dead_letter_queue = %self.config.topology.dead_letter_queue,
            handlers = self.registry.len(),
            store = S::name(),
            "starting sink"
        );

        let primary = PrimaryConsumer::new(
            self.config.clone(),
            self.store.clone(),
            self.registry.clone(),
            self.shutdown_tx.subscribe(),
        )
        .spawn()
        .await?;

        let dead_letter =
            DeadLetterConsumer::new(self.config.clone(), self.shutdown_tx.subscribe())
                .spawn()
                .await?;

        self.state = SinkState::Started {
            primary,
            dead_letter,
        };

        Ok(())
    }

    /// Waits for both consumers to stop.
    ///
    /// A consumer only stops on shutdown or on a fatal error. When the primary consumer fails,
    /// the dead-letter consumer is shut down as well since it would only cycle messages
    /// nobody consumes.
    pub async fn wait(self) -> SinkResult<()> {
        let SinkState::Started {
            primary,
            dead_letter,
        } = self.state
        else {
            info!("sink was not started, nothing to wait for");

            return Ok(());
        };

        let mut errors = vec![];

        info!("waiting for primary consumer to complete");

        if let Err(err) = primary.wait().await {
            errors.push(err);

            // No receiver left means the dead-letter consumer already stopped.
            let _ = self.shutdown_tx.shutdown();

            info!("primary consumer completed with an error, shutting down dead-letter consumer");
        }

        info!("waiting for dead-letter consumer to complete");

        if let Err(err) = dead_letter.wait().await {
            errors.push(err);

            info!("dead-letter consumer completed with an error");
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }

    pub fn shutdown(&self) {
        info!("trying to shut down the sink");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!(error = %err, "failed to send shutdown signal to the consumers");
            return;
        }

        info!("shutdown signal successfully sent to all consumers");
    }

    pub async fn shutdown_and_wait(self) -> SinkResult<()> {
        self.shutdown();
        self.wait().await
    }
}
