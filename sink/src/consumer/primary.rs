use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions};
use lapin::types::FieldTable;
use sink_config::shared::SinkConfig;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use crate::bail;
use crate::broker::{BrokerSession, declare_primary_topology, open_session};
use crate::concurrency::shutdown::ShutdownRx;
use crate::consumer::processor::{DeliveryOutcome, DeliveryProcessor};
use crate::consumer::reconnect::{ReconnectionManager, supervise};
use crate::envelope::MessageTypeResolver;
use crate::error::{ErrorKind, SinkResult};
use crate::registry::HandlerRegistry;
use crate::store::Store;
use crate::workers::base::WorkerType;
use crate::workers::consumer::ConsumerWorkerHandle;

/// Returns the name the primary consumer gives its broker connection.
pub fn connection_name(queue: &str) -> String {
    format!("{queue}_consumer")
}

/// Consumer of the primary queue.
///
/// Owns one broker connection, declares the topology and consumes with manual
/// acknowledgements, processing one delivery at a time.
#[derive(Debug)]
pub struct PrimaryConsumer<S> {
    config: Arc<SinkConfig>,
    processor: DeliveryProcessor<S>,
    shutdown_rx: ShutdownRx,
}

impl<S> PrimaryConsumer<S>
where
    S: Store + Send + Sync + 'static,
    S::Session: Send,
{
    pub fn new(
        config: Arc<SinkConfig>,
        store: S,
        registry: Arc<HandlerRegistry>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        let resolver = MessageTypeResolver::from_config(&config.topology);

        Self {
            config,
            processor: DeliveryProcessor::new(store, registry, resolver),
            shutdown_rx,
        }
    }

    pub async fn spawn(self) -> SinkResult<ConsumerWorkerHandle> {
        info!(queue = %self.config.topology.primary_queue, "starting primary consumer");

        let manager = ReconnectionManager::new(self.config.reconnection.clone());
        let status_rx = manager.subscribe();

        let span = tracing::info_span!(
            "primary_consumer",
            queue = %self.config.topology.primary_queue
        );
        let worker = async move {
            let config = &self.config;
            let processor = &self.processor;
            let name = connection_name(&config.topology.primary_queue);

            supervise(
                WorkerType::Primary,
                manager,
                self.shutdown_rx.clone(),
                || connect(config, &name),
                |session, shutdown_rx| consume(config, processor, session, shutdown_rx),
            )
            .await
        }
        .instrument(span.or_current());

        let handle = tokio::spawn(worker);

        Ok(ConsumerWorkerHandle::new(
            WorkerType::Primary,
            status_rx,
            handle,
        ))
    }
}

async fn connect(config: &SinkConfig, connection_name: &str) -> SinkResult<BrokerSession> {
    let session = open_session(&config.broker, connection_name).await?;

    if let Err(err) = declare_primary_topology(&session.channel, &config.topology).await {
        session.close().await;
        return Err(err);
    }

    Ok(session)
}

async fn consume<S>(
    config: &SinkConfig,
    processor: &DeliveryProcessor<S>,
    session: BrokerSession,
    mut shutdown_rx: ShutdownRx,
) -> SinkResult<()>
where
    S: Store + Sync,
    S::Session: Send,
{
    let result = consume_deliveries(config, processor, &session, &mut shutdown_rx).await;
    session.close().await;

    result
}

async fn consume_deliveries<S>(
    config: &SinkConfig,
    processor: &DeliveryProcessor<S>,
    session: &BrokerSession,
    shutdown_rx: &mut ShutdownRx,
) -> SinkResult<()>
where
    S: Store + Sync,
    S::Session: Send,
{
    let prefetch_count = config.topology.prefetch_count;

    session
        .channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await?;

    let consumer_tag = format!(
        "{}-{}",
        connection_name(&config.topology.primary_queue),
        uuid::Uuid::new_v4()
    );
    let mut consumer = session
        .channel
        .basic_consume(
            &config.topology.primary_queue,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(%consumer_tag, prefetch_count, "consuming primary queue");

    let mut withheld = WithheldDeliveries::new(prefetch_count, config.topology.message_ttl());

    loop {
        let delivery = tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("shutdown requested, stopping primary consumer");
                return Ok(());
            }
            _ = expiry(withheld.deadline()) => {
                withheld.check_age(Instant::now())?;
                continue;
            }
            delivery = consumer.next() => delivery,
        };

        let delivery = match delivery {
            Some(delivery) => delivery?,
            None => bail!(
                ErrorKind::BrokerConnectionFailed,
                "Broker closed the consumer stream"
            ),
        };

        let outcome = process_delivery(processor, &delivery).await;
        settle(
            &delivery.acker,
            delivery.delivery_tag,
            outcome,
            &mut withheld,
            Instant::now(),
        )
        .await?;
    }
}

async fn process_delivery<S>(processor: &DeliveryProcessor<S>, delivery: &Delivery) -> DeliveryOutcome
where
    S: Store + Sync,
    S::Session: Send,
{
    let span = tracing::debug_span!("delivery", delivery_tag = delivery.delivery_tag);

    processor
        .process(
            delivery.routing_key.as_str(),
            delivery.properties.headers().as_ref(),
            &delivery.data,
        )
        .instrument(span)
        .await
}

/// Settles deliveries with the broker.
trait Acknowledger {
    fn ack(&self) -> impl Future<Output = SinkResult<()>> + Send;

    /// Rejects without requeueing, the broker dead-letters the delivery.
    fn reject(&self) -> impl Future<Output = SinkResult<()>> + Send;
}

impl Acknowledger for Acker {
    async fn ack(&self) -> SinkResult<()> {
        Acker::ack(self, BasicAckOptions::default()).await?;

        Ok(())
    }

    async fn reject(&self) -> SinkResult<()> {
        Acker::reject(self, BasicRejectOptions { requeue: false }).await?;

        Ok(())
    }
}

/// Deliveries left unacknowledged on the current channel.
///
/// The broker neither redelivers nor expires a delivery while it is unacknowledged on an
/// open channel. The channel is recycled, making the broker requeue them, once withheld
/// deliveries fill the prefetch window or the oldest of them outlives the message TTL.
#[derive(Debug)]
struct WithheldDeliveries {
    count: u16,
    oldest: Option<Instant>,
    capacity: u16,
    max_age: Duration,
}

impl WithheldDeliveries {
    fn new(capacity: u16, max_age: Duration) -> Self {
        Self {
            count: 0,
            oldest: None,
            capacity,
            max_age,
        }
    }

    /// Records a delivery withheld at `now`.
    fn record(&mut self, now: Instant) -> SinkResult<()> {
        self.count = self.count.saturating_add(1);
        self.oldest.get_or_insert(now);

        if self.capacity > 0 && self.count >= self.capacity {
            bail!(
                ErrorKind::ChannelRecycled,
                "Every prefetched delivery is withheld, recycling the channel",
                format!("{} deliveries withheld", self.count)
            );
        }

        self.check_age(now)
    }

    /// Returns when the oldest withheld delivery outlives the message TTL.
    fn deadline(&self) -> Option<Instant> {
        self.oldest.map(|oldest| oldest + self.max_age)
    }

    fn check_age(&self, now: Instant) -> SinkResult<()> {
        if let Some(deadline) = self.deadline() {
            if now >= deadline {
                bail!(
                    ErrorKind::ChannelRecycled,
                    "A withheld delivery outlived the message TTL, recycling the channel",
                    format!(
                        "{} deliveries withheld, oldest for at least {:?}",
                        self.count, self.max_age
                    )
                );
            }
        }

        Ok(())
    }
}

/// Resolves at `deadline`, never without one.
async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Settles a delivery according to its outcome.
async fn settle<A: Acknowledger>(
    acker: &A,
    delivery_tag: u64,
    outcome: DeliveryOutcome,
    withheld: &mut WithheldDeliveries,
    now: Instant,
) -> SinkResult<()> {
    match outcome {
        DeliveryOutcome::Acknowledged => {
            acker.ack().await?;
            debug!(delivery_tag, "acknowledged delivery");
        }
        DeliveryOutcome::Rejected(err) => {
            acker.reject().await?;

            return Err(err);
        }
        DeliveryOutcome::Withheld(_) => {
            warn!(
                delivery_tag,
                withheld = withheld.count.saturating_add(1),
                "acknowledgement withheld"
            );
            withheld.record(now)?;
        }
    }

    Ok(())
}
