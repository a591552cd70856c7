use std::sync::Arc;

use lapin::types::FieldTable;
use tracing::{debug, error, info, warn};

use crate::envelope::{MessageTypeResolver, decode_message, truncated_body};
use crate::error::{ErrorCategory, SinkError};
use crate::registry::{DispatchOutcome, HandlerRegistry};
use crate::store::{Session, Store};

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The message was persisted, is undecodable or has no handler.
    Acknowledged,
    /// The store could not be reached. The message is rejected without requeue and the
    /// consumer reconnects.
    Rejected(SinkError),
    /// Handling or persisting failed. No acknowledgement is sent, the message is retried
    /// through the TTL and dead-letter cycle.
    Withheld(SinkError),
}

impl DeliveryOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, DeliveryOutcome::Acknowledged)
    }
}

/// Processes the deliveries of the primary queue, one at a time.
///
/// Every message gets its own store session. The session is committed only when the handler
/// succeeded and rolled back otherwise, so an acknowledgement always follows a commit.
#[derive(Debug, Clone)]
pub struct DeliveryProcessor<S> {
    store: S,
    registry: Arc<HandlerRegistry>,
    resolver: MessageTypeResolver,
}

impl<S> DeliveryProcessor<S>
where
    S: Store + Sync,
    S::Session: Send,
{
    pub fn new(store: S, registry: Arc<HandlerRegistry>, resolver: MessageTypeResolver) -> Self {
        Self {
            store,
            registry,
            resolver,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn process(
        &self,
        routing_key: &str,
        headers: Option<&FieldTable>,
        data: &[u8],
    ) -> DeliveryOutcome {
        let message = match decode_message(data) {
            Ok(message) => message,
            Err(err) => {
                error!(
                    routing_key,
                    error = %err,
                    body = %truncated_body(data),
                    "failed to decode message, acknowledging it"
                );

                return DeliveryOutcome::Acknowledged;
            }
        };

        let message_type = self.resolver.resolve(routing_key, headers, &message);

        if !self.registry.contains(&message_type) {
            warn!(%message_type, "no handler registered for message type, acknowledging it");

            return DeliveryOutcome::Acknowledged;
        }

        let mut session = match self.store.scoped_connection().await {
            Ok(session) => session,
            Err(err) => {
                error!(
                    %message_type,
                    store = S::name(),
                    error = %err,
                    "failed to open store session, rejecting message"
                );

                return DeliveryOutcome::Rejected(err);
            }
        };

        let result = self
            .registry
            .dispatch(&message_type, &message, &mut session)
            .await;

        match result {
            Ok(DispatchOutcome::Handled) => match session.commit().await {
                Ok(()) => {
                    info!(%message_type, "message persisted");
                    DeliveryOutcome::Acknowledged
                }
                Err(err) => {
                    error!(
                        %message_type,
                        error = %err,
                        body = %truncated_body(data),
                        "failed to commit message, withholding acknowledgement"
                    );
                    DeliveryOutcome::Withheld(err)
                }
            },
            Ok(DispatchOutcome::Unhandled) => {
                rollback(session).await;
                DeliveryOutcome::Acknowledged
            }
            Err(err) => {
                error!(
                    %message_type,
                    error = %err,
                    body = %truncated_body(data),
                    "failed to handle message, withholding acknowledgement"
                );
                rollback(session).await;

                // A lost store connection is settled like a failed connection attempt.
                if err.category() == ErrorCategory::Connection {
                    return DeliveryOutcome::Rejected(err);
                }

                DeliveryOutcome::Withheld(err)
            }
        }
    }
}

async fn rollback<T: Session>(session: T) {
    if let Err(err) = session.rollback().await {
        debug!(error = %err, "rollback failed, the connection is closed anyway");
    }
}

