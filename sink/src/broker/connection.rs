use lapin::types::LongString;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};
use secrecy::ExposeSecret;
use sink_config::shared::BrokerConfig;
use tracing::{debug, info, warn};

use crate::error::SinkResult;

/// Reply code sent when closing channels and connections on purpose.
const REPLY_SUCCESS: u16 = 200;

/// Builds the AMQP URI for `config`.
pub fn amqp_uri(config: &BrokerConfig) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.expose_secret().clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.virtual_host.clone(),
        ..Default::default()
    }
}

/// A broker connection with the single channel used by one consumer.
#[derive(Debug)]
pub struct BrokerSession {
    pub connection: Connection,
    pub channel: Channel,
}

impl BrokerSession {
    /// Closes the channel and the connection.
    ///
    /// Unacknowledged deliveries of the channel are returned to their queue by the broker.
    pub async fn close(self) {
        if let Err(err) = self.channel.close(REPLY_SUCCESS, "consumer stopped").await {
            debug!(error = %err, "failed to close broker channel");
        }

        if let Err(err) = self.connection.close(REPLY_SUCCESS, "consumer stopped").await {
            warn!(error = %err, "failed to close broker connection");
        }
    }
}

/// Opens a named connection to the broker and a channel on it.
pub async fn open_session(config: &BrokerConfig, connection_name: &str) -> SinkResult<BrokerSession> {
    let properties = ConnectionProperties::default()
        .with_connection_name(LongString::from(connection_name.to_owned()));

    let connection = Connection::connect_uri(amqp_uri(config), properties).await?;
    let channel = connection.create_channel().await?;

    info!(
        host = %config.host,
        port = config.port,
        connection_name,
        "connected to broker"
    );

    Ok(BrokerSession {
        connection,
        channel,
    })
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_uri_carries_credentials_and_vhost() {
        let config = BrokerConfig {
            host: "rabbitmq".to_owned(),
            port: 5673,
            virtual_host: "wbor".to_owned(),
            username: "sink".to_owned(),
            password: SecretString::new("secret".to_owned()),
        };

        let uri = amqp_uri(&config);

        assert_eq!(uri.authority.host, "rabbitmq");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.authority.userinfo.username, "sink");
        assert_eq!(uri.authority.userinfo.password, "secret");
        assert_eq!(uri.vhost, "wbor");
    }
}
