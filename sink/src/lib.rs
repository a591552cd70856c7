//! Durable message-to-row sink.
//!
//! Consumes JSON messages from a RabbitMQ queue, turns every message into rows through the
//! handler registered for its type and persists them in Postgres. A message is acknowledged
//! only after its rows are committed. Messages that could not be persisted expire into a
//! dead-letter queue, from which a second consumer feeds them back into the primary queue.

pub mod broker;
pub mod concurrency;
pub mod consumer;
pub mod conversions;
pub mod envelope;
pub mod error;
pub mod failpoints;
pub mod handlers;
mod macros;
pub mod pipeline;
pub mod projection;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
