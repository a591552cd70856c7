//! Configuration sections of the sink service.

mod base;
mod broker;
mod connection;
mod health;
mod reconnection;
mod sink;
mod tables;
mod topology;

pub use base::ValidationError;
pub use broker::BrokerConfig;
pub use connection::{IntoConnectOptions, PgConnectionConfig, SINK_STORE_OPTIONS, PgConnectionOptions, TlsConfig};
pub use health::HealthConfig;
pub use reconnection::ReconnectionConfig;
pub use sink::SinkConfig;
pub use tables::TablesConfig;
pub use topology::TopologyConfig;
