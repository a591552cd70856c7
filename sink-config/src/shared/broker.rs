use secrecy::SecretString;
use serde::Deserialize;

use crate::Config;

/// Connection settings for the RabbitMQ broker.
///
/// Both consumers open their own connection with these settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,
    pub username: String,
    pub password: SecretString,
}

impl Config for BrokerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_port() -> u16 {
    5672
}

fn default_virtual_host() -> String {
    "/".to_string()
}
