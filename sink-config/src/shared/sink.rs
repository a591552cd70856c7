use serde::Deserialize;

use crate::Config;
use crate::shared::{
    BrokerConfig, HealthConfig, PgConnectionConfig, ReconnectionConfig, TablesConfig,
    TopologyConfig, ValidationError,
};

/// Complete configuration of the sink service.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking the broker and store passwords into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Broker both consumers connect to.
    pub broker: BrokerConfig,
    /// Database rows are written to.
    pub store: PgConnectionConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub reconnection: ReconnectionConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

impl SinkConfig {
    /// Validates the complete sink configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.topology.validate()?;
        self.store.validate()
    }
}

impl Config for SinkConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
