use lapin::types::{AMQPValue, FieldTable, LongString};
use secrecy::SecretString;
use serde_json::Value;
use sink_config::shared::{
    BrokerConfig, HealthConfig, PgConnectionConfig, ReconnectionConfig, SinkConfig, TablesConfig,
    TlsConfig, TopologyConfig,
};

/// Serializes `value` into a message body.
pub fn json_body(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

/// Builds a header table holding string values.
pub fn string_headers(entries: &[(&str, &str)]) -> FieldTable {
    let mut headers = FieldTable::default();
    for (name, value) in entries {
        headers.insert(
            (*name).into(),
            AMQPValue::LongString(LongString::from(value.to_string())),
        );
    }

    headers
}

/// Returns the routing key publishers use for `message_type` with the default prefix.
pub fn routing_key(message_type: &str) -> String {
    format!("{}{message_type}", TopologyConfig::default().routing_key_prefix_with_separator())
}

/// Returns a configuration pointing at a broker and a store on `host:port`.
///
/// Port 1 on the loopback address gives endpoints that refuse every connection.
pub fn sink_config(host: &str, broker_port: u16, store_port: u16) -> SinkConfig {
    SinkConfig {
        broker: BrokerConfig {
            host: host.to_string(),
            port: broker_port,
            virtual_host: "/".to_string(),
            username: "guest".to_string(),
            password: SecretString::new("guest".to_string()),
        },
        store: PgConnectionConfig {
            host: host.to_string(),
            port: store_port,
            name: "sink".to_string(),
            username: "postgres".to_string(),
            password: None,
            tls: TlsConfig::disabled(),
        },
        topology: TopologyConfig::default(),
        reconnection: ReconnectionConfig::default(),
        tables: TablesConfig::default(),
        health: HealthConfig::default(),
    }
}
