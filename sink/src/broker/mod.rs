//! RabbitMQ connection, topology and publishing.

pub mod connection;
pub mod publisher;
pub mod topology;

pub use connection::{BrokerSession, amqp_uri, open_session};
pub use publisher::Publisher;
pub use topology::{declare_dead_letter_topology, declare_primary_topology, primary_queue_arguments};
