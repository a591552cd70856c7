use std::sync::Arc;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, ConfirmSelectOptions};
use lapin::BasicProperties;
use lapin::types::{AMQPValue, FieldTable, LongString};
use sink_config::shared::{SinkConfig, TopologyConfig};
use tracing::{Instrument, info, warn};

use crate::bail;
use crate::broker::{BrokerSession, Publisher, declare_dead_letter_topology, open_session};
use crate::concurrency::shutdown::ShutdownRx;
use crate::consumer::primary::connection_name;
use crate::consumer::reconnect::{ReconnectionManager, supervise};
use crate::envelope::{
    ORIGINAL_ROUTING_KEY_HEADER, RETRY_COUNT_HEADER, dead_lettered_routing_key, header_string,
    header_u32,
};
use crate::error::{ErrorKind, SinkResult};
use crate::workers::base::WorkerType;
use crate::workers::consumer::ConsumerWorkerHandle;

/// Where a dead-lettered message is published.
#[derive(Debug, Clone, PartialEq)]
pub struct Republish {
    pub exchange: String,
    pub routing_key: String,
    pub headers: FieldTable,
    pub retry_count: u32,
    /// `true` when the retry ceiling was reached and the message goes to the parking queue.
    pub parked: bool,
}

/// Decides where a dead-lettered message goes.
///
/// Messages go back to the primary queue through the default exchange. The original headers
/// are kept, the routing key the message was first published with is recorded and the retry
/// count is incremented. That routing key comes from an earlier republish, from the broker's
/// `x-death` header or, failing both, from the delivery itself. With a retry ceiling
/// configured, a message whose incremented count reaches it is routed to the parking queue
/// instead.
pub fn plan_republish(
    topology: &TopologyConfig,
    routing_key: &str,
    headers: Option<&FieldTable>,
) -> Republish {
    let retry_count = header_u32(headers, RETRY_COUNT_HEADER)
        .unwrap_or(0)
        .saturating_add(1);
    let original_routing_key = header_string(headers, ORIGINAL_ROUTING_KEY_HEADER)
        .or_else(|| dead_lettered_routing_key(headers))
        .unwrap_or_else(|| routing_key.to_owned());

    let mut republished_headers = headers.cloned().unwrap_or_default();
    republished_headers.insert(
        ORIGINAL_ROUTING_KEY_HEADER.into(),
        AMQPValue::LongString(LongString::from(original_routing_key)),
    );
    republished_headers.insert(
        RETRY_COUNT_HEADER.into(),
        AMQPValue::LongLongInt(i64::from(retry_count)),
    );

    let parked = topology
        .max_retries
        .is_some_and(|max_retries| retry_count >= max_retries);
    let routing_key = match parked {
        true => topology.parking_queue.clone(),
        false => topology.primary_queue.clone(),
    };

    Republish {
        exchange: String::new(),
        routing_key,
        headers: republished_headers,
        retry_count,
        parked,
    }
}

/// Republishes one dead-lettered message through `publisher`.
///
/// The body is published byte for byte and the delivery's properties, such as content type,
/// message id and timestamp, are kept. Only the headers are replaced by the planned ones.
pub async fn republish<P: Publisher>(
    publisher: &P,
    topology: &TopologyConfig,
    routing_key: &str,
    properties: &BasicProperties,
    body: &[u8],
) -> SinkResult<Republish> {
    let plan = plan_republish(topology, routing_key, properties.headers().as_ref());
    let properties = properties.clone().with_headers(plan.headers.clone());

    publisher
        .publish(&plan.exchange, &plan.routing_key, body, properties)
        .await?;

    match plan.parked {
        true => warn!(
            routing_key,
            retry_count = plan.retry_count,
            queue = %plan.routing_key,
            "retry ceiling reached, message parked"
        ),
        false => info!(
            routing_key,
            retry_count = plan.retry_count,
            queue = %plan.routing_key,
            "dead-lettered message republished"
        ),
    }

    Ok(plan)
}

/// Consumer pumping the dead-letter queue back into the primary queue.
#[derive(Debug)]
pub struct DeadLetterConsumer {
    config: Arc<SinkConfig>,
    shutdown_rx: ShutdownRx,
}

impl DeadLetterConsumer {
    pub fn new(config: Arc<SinkConfig>, shutdown_rx: ShutdownRx) -> Self {
        Self {
            config,
            shutdown_rx,
        }
    }

    pub async fn spawn(self) -> SinkResult<ConsumerWorkerHandle> {
        info!(queue = %self.config.topology.dead_letter_queue, "starting dead-letter consumer");

        let manager = ReconnectionManager::new(self.config.reconnection.clone());
        let status_rx = manager.subscribe();

        let span = tracing::info_span!(
            "dead_letter_consumer",
            queue = %self.config.topology.dead_letter_queue
        );
        let worker = async move {
            let config = &self.config;
            let name = connection_name(&config.topology.dead_letter_queue);

            supervise(
                WorkerType::DeadLetter,
                manager,
                self.shutdown_rx.clone(),
                || connect(config, &name),
                |session, shutdown_rx| consume(config, session, shutdown_rx),
            )
            .await
        }
        .instrument(span.or_current());

        let handle = tokio::spawn(worker);

        Ok(ConsumerWorkerHandle::new(
            WorkerType::DeadLetter,
            status_rx,
            handle,
        ))
    }
}

async fn connect(config: &SinkConfig, connection_name: &str) -> SinkResult<BrokerSession> {
    let session = open_session(&config.broker, connection_name).await?;

    let declared = async {
        declare_dead_letter_topology(&session.channel, &config.topology).await?;
        session
            .channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        SinkResult::Ok(())
    }
    .await;

    if let Err(err) = declared {
        session.close().await;
        return Err(err);
    }

    Ok(session)
}

async fn consume(
    config: &SinkConfig,
    session: BrokerSession,
    mut shutdown_rx: ShutdownRx,
) -> SinkResult<()> {
    let result = pump(config, &session, &mut shutdown_rx).await;
    session.close().await;

    result
}

async fn pump(
    config: &SinkConfig,
    session: &BrokerSession,
    shutdown_rx: &mut ShutdownRx,
) -> SinkResult<()> {
    let topology = &config.topology;

    session
        .channel
        .basic_qos(topology.prefetch_count, BasicQosOptions::default())
        .await?;

    let consumer_tag = format!(
        "{}-{}",
        connection_name(&topology.dead_letter_queue),
        uuid::Uuid::new_v4()
    );
    let mut consumer = session
        .channel
        .basic_consume(
            &topology.dead_letter_queue,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(%consumer_tag, "consuming dead-letter queue");

    loop {
        let delivery = tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("shutdown requested, stopping dead-letter consumer");
                return Ok(());
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

        republish(
            &session.channel,
            topology,
            delivery.routing_key.as_str(),
            &delivery.properties,
            &delivery.data,
        )
        .await?;

        delivery.acker.ack(BasicAckOptions::default()).await?;
    }
}
