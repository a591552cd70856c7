//! Built-in message handlers.

mod groupme;
mod twilio;

pub use groupme::{groupme_callback, groupme_image, groupme_message};
pub use twilio::{twilio_sms_incoming, twilio_sms_outgoing};

use sink_config::shared::TablesConfig;
use sink_postgres::TableName;

use crate::error::SinkResult;
use crate::registry::{HandlerRegistry, LogOnlyHandler};

/// Builds the registry with every built-in handler, writing to the tables in `tables`.
pub fn default_registry(tables: &TablesConfig) -> SinkResult<HandlerRegistry> {
    let messages: TableName = tables.messages.parse()?;
    let sent_messages: TableName = tables.sent_messages.parse()?;
    let groupme: TableName = tables.groupme.parse()?;
    let groupme_callbacks: TableName = tables.groupme_callbacks.parse()?;

    let mut registry = HandlerRegistry::new();
    registry
        .register_projection("twilio.sms.incoming", messages, twilio_sms_incoming)
        .register_projection("twilio.sms.outgoing", sent_messages, twilio_sms_outgoing)
        .register(
            "twilio.voice-intelligence",
            LogOnlyHandler::debug("received voice intelligence event, nothing to store"),
        )
        .register(
            "twilio.call-events",
            LogOnlyHandler::debug("received call event, nothing to store"),
        )
        .register_projection("groupme.msg", groupme.clone(), groupme_message)
        .register_projection("groupme.img", groupme, groupme_image)
        .register_projection("groupme.callback", groupme_callbacks, groupme_callback)
        .register(
            "postgres",
            LogOnlyHandler::error("received message typed as the primary queue, no handler implemented"),
        );

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_built_in_types() {
        let registry = default_registry(&TablesConfig::default()).unwrap();

        assert_eq!(
            registry.message_types(),
            [
                "groupme.callback",
                "groupme.img",
                "groupme.msg",
                "postgres",
                "twilio.call-events",
                "twilio.sms.incoming",
                "twilio.sms.outgoing",
                "twilio.voice-intelligence",
            ]
        );
    }

    #[test]
    fn test_invalid_table_name_is_config_error() {
        let tables = TablesConfig {
            groupme: "public.".to_owned(),
            ..TablesConfig::default()
        };

        let err = default_registry(&tables).unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigError);
    }
}
