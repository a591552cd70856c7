use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use lapin::types::{AMQPValue, FieldTable, LongString};
use lapin::{Channel, ExchangeKind};
use sink_config::shared::TopologyConfig;
use tracing::debug;

use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::{bail, sink_error};

const MESSAGE_TTL_ARGUMENT: &str = "x-message-ttl";
const DEAD_LETTER_EXCHANGE_ARGUMENT: &str = "x-dead-letter-exchange";
const DEAD_LETTER_ROUTING_KEY_ARGUMENT: &str = "x-dead-letter-routing-key";

/// Arguments of the primary queue.
///
/// Messages left unacknowledged past the TTL, and rejected messages, are moved to the
/// dead-letter exchange by the broker. They are dead-lettered with the dead-letter queue name
/// as routing key, the only key the direct dead-letter exchange routes.
pub fn primary_queue_arguments(topology: &TopologyConfig) -> SinkResult<FieldTable> {
    let Ok(message_ttl) = i32::try_from(topology.message_ttl_ms) else {
        bail!(
            ErrorKind::ConfigError,
            "Message TTL does not fit the queue argument",
            format!("{} ms is too large", topology.message_ttl_ms)
        );
    };

    let mut arguments = FieldTable::default();
    arguments.insert(MESSAGE_TTL_ARGUMENT.into(), AMQPValue::LongInt(message_ttl));
    arguments.insert(
        DEAD_LETTER_EXCHANGE_ARGUMENT.into(),
        AMQPValue::LongString(LongString::from(topology.dead_letter_exchange.clone())),
    );
    arguments.insert(
        DEAD_LETTER_ROUTING_KEY_ARGUMENT.into(),
        AMQPValue::LongString(LongString::from(topology.dead_letter_queue.clone())),
    );

    Ok(arguments)
}

/// Classifies an error raised while declaring or binding.
///
/// The broker answers a declaration that conflicts with an existing exchange or queue with
/// `PRECONDITION_FAILED`. Outside declarations the same code reports recoverable channel
/// failures, such as an acknowledgement timeout.
fn declaration_error(err: lapin::Error) -> SinkError {
    let conflicts = matches!(
        &err,
        lapin::Error::ProtocolError(amqp)
            if matches!(amqp.kind(), AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED))
    );

    if conflicts {
        let detail = err.to_string();
        return sink_error!(
            ErrorKind::TopologyMismatch,
            "Broker rejected the declared topology",
            detail = detail,
            source: err
        );
    }

    err.into()
}

fn durable_exchange() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

/// Declares the dead-letter exchange and queue and binds them.
async fn declare_dead_letter_route(channel: &Channel, topology: &TopologyConfig) -> SinkResult<()> {
    channel
        .exchange_declare(
            &topology.dead_letter_exchange,
            ExchangeKind::Direct,
            durable_exchange(),
            FieldTable::default(),
        )
        .await
        .map_err(declaration_error)?;
    channel
        .queue_declare(
            &topology.dead_letter_queue,
            durable_queue(),
            FieldTable::default(),
        )
        .await
        .map_err(declaration_error)?;
    channel
        .queue_bind(
            &topology.dead_letter_queue,
            &topology.dead_letter_exchange,
            &topology.dead_letter_queue,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(declaration_error)?;

    Ok(())
}

async fn declare_primary_queue(channel: &Channel, topology: &TopologyConfig) -> SinkResult<()> {
    channel
        .queue_declare(
            &topology.primary_queue,
            durable_queue(),
            primary_queue_arguments(topology)?,
        )
        .await
        .map_err(declaration_error)?;

    Ok(())
}

/// Declares everything the primary consumer reads from.
///
/// The source exchange (topic), the dead-letter route and the primary queue, bound to the
/// source exchange with `<prefix>.#`. A queue that already exists with other arguments makes
/// the broker close the channel with `PRECONDITION_FAILED`, surfaced as
/// [`ErrorKind::TopologyMismatch`].
pub async fn declare_primary_topology(channel: &Channel, topology: &TopologyConfig) -> SinkResult<()> {
    channel
        .exchange_declare(
            &topology.source_exchange,
            ExchangeKind::Topic,
            durable_exchange(),
            FieldTable::default(),
        )
        .await
        .map_err(declaration_error)?;

    declare_dead_letter_route(channel, topology).await?;
    declare_primary_queue(channel, topology).await?;

    channel
        .queue_bind(
            &topology.primary_queue,
            &topology.source_exchange,
            &topology.binding_key(),
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(declaration_error)?;

    debug!(
        queue = %topology.primary_queue,
        binding_key = %topology.binding_key(),
        "declared primary topology"
    );

    Ok(())
}

/// Declares everything the dead-letter consumer reads from and publishes to.
///
/// The primary queue is declared too so that republished messages are never dropped by the
/// default exchange. The parking queue is only declared when a retry ceiling is configured.
pub async fn declare_dead_letter_topology(
    channel: &Channel,
    topology: &TopologyConfig,
) -> SinkResult<()> {
    declare_dead_letter_route(channel, topology).await?;
    declare_primary_queue(channel, topology).await?;

    if topology.max_retries.is_some() {
        channel
            .queue_declare(&topology.parking_queue, durable_queue(), FieldTable::default())
            .await
            .map_err(declaration_error)?;
    }

    debug!(
        queue = %topology.dead_letter_queue,
        exchange = %topology.dead_letter_exchange,
        "declared dead-letter topology"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use lapin::types::ShortString;

    use super::*;

    #[test]
    fn test_primary_queue_arguments() {
        let topology = TopologyConfig::default();

        let arguments = primary_queue_arguments(&topology).unwrap();

        assert_eq!(
            arguments.inner().get(&ShortString::from(MESSAGE_TTL_ARGUMENT)),
            Some(&AMQPValue::LongInt(60_000))
        );
        assert_eq!(
            arguments
                .inner()
                .get(&ShortString::from(DEAD_LETTER_EXCHANGE_ARGUMENT)),
            Some(&AMQPValue::LongString(LongString::from(
                "dead_letter_exchange".to_owned()
            )))
        );
        assert_eq!(
            arguments
                .inner()
                .get(&ShortString::from(DEAD_LETTER_ROUTING_KEY_ARGUMENT)),
            Some(&AMQPValue::LongString(LongString::from(
                "dead_letter_queue".to_owned()
            )))
        );
    }

    #[test]
    fn test_precondition_failure_on_declaration_is_topology_mismatch() {
        let err = declaration_error(lapin::Error::ProtocolError(lapin::protocol::AMQPError::new(
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED),
            ShortString::from("PRECONDITION_FAILED - cannot redeclare exchange 'source_exchange'"),
        )));

        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert!(err.kind().is_fatal());
    }

    #[test]
    fn test_other_declaration_failures_are_recoverable() {
        let err = declaration_error(lapin::Error::ProtocolError(lapin::protocol::AMQPError::new(
            AMQPErrorKind::Soft(AMQPSoftError::RESOURCELOCKED),
            ShortString::from("RESOURCE_LOCKED - cannot obtain exclusive access to queue"),
        )));

        assert_eq!(err.kind(), ErrorKind::BrokerChannelFailed);
        assert!(!err.kind().is_fatal());
    }

    #[test]
    fn test_oversized_ttl_is_config_error() {
        let topology = TopologyConfig {
            message_ttl_ms: u32::MAX,
            ..Default::default()
        };

        let err = primary_queue_arguments(&topology).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
