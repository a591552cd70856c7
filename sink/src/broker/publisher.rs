use std::future::Future;

use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};

use crate::bail;
use crate::error::{ErrorKind, SinkResult};

/// Delivery mode marking a message as persistent.
const PERSISTENT: u8 = 2;

/// Publishes message bodies to the broker.
pub trait Publisher {
    /// Publishes `body` as a persistent message and waits for the broker to confirm it.
    ///
    /// Every property but the delivery mode is published as passed.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> impl Future<Output = SinkResult<()>> + Send;
}

impl Publisher for Channel {
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> impl Future<Output = SinkResult<()>> + Send {
        let channel = self.clone();
        let exchange = exchange.to_owned();
        let routing_key = routing_key.to_owned();
        let body = body.to_vec();

        async move {
            let properties = properties.with_delivery_mode(PERSISTENT);

            let confirmation = channel
                .basic_publish(
                    &exchange,
                    &routing_key,
                    BasicPublishOptions::default(),
                    &body,
                    properties,
                )
                .await?
                .await?;

            if confirmation.is_nack() {
                bail!(
                    ErrorKind::BrokerChannelFailed,
                    "Broker refused the published message",
                    format!("publish to `{exchange}` with routing key `{routing_key}` was nacked")
                );
            }

            Ok(())
        }
    }
}
