//! Decoding of delivery bodies and resolution of their message type.

use lapin::types::{AMQPValue, FieldTable, ShortString};
use serde_json::{Map, Value};
use sink_config::shared::TopologyConfig;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};

/// A decoded delivery body.
pub type Message = Map<String, Value>;

/// Header carrying the routing key a message was first published with.
///
/// Set by the dead-letter pump, since republishing through the default exchange replaces the
/// routing key with the primary queue name.
pub const ORIGINAL_ROUTING_KEY_HEADER: &str = "x-original-routing-key";

/// Header the broker adds when dead-lettering a message.
pub const DEATH_HEADER: &str = "x-death";

/// Header counting how many times the dead-letter pump republished a message.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Maximum number of body bytes rendered in log lines.
pub const LOGGED_BODY_LIMIT: usize = 256;

/// Decodes a delivery body into a JSON object.
pub fn decode_message(data: &[u8]) -> SinkResult<Message> {
    match serde_json::from_slice::<Value>(data)? {
        Value::Object(message) => Ok(message),
        other => bail!(
            ErrorKind::InvalidEnvelope,
            "Message body is not a JSON object",
            format!("the body decoded to a JSON {}", json_type_name(&other))
        ),
    }
}

/// Renders at most [`LOGGED_BODY_LIMIT`] bytes of a body for logging.
pub fn truncated_body(data: &[u8]) -> String {
    if data.len() <= LOGGED_BODY_LIMIT {
        return String::from_utf8_lossy(data).into_owned();
    }

    format!(
        "{}... ({} bytes)",
        String::from_utf8_lossy(&data[..LOGGED_BODY_LIMIT]),
        data.len()
    )
}

/// Returns a header as a string, if present and textual.
pub fn header_string(headers: Option<&FieldTable>, name: &str) -> Option<String> {
    match headers?.inner().get(&ShortString::from(name))? {
        AMQPValue::LongString(value) => Some(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        AMQPValue::ShortString(value) => Some(value.as_str().to_owned()),
        _ => None,
    }
}

/// Returns the routing key a message had before the broker dead-lettered it.
///
/// Read from the most recent entry of the [`DEATH_HEADER`].
pub fn dead_lettered_routing_key(headers: Option<&FieldTable>) -> Option<String> {
    let AMQPValue::FieldArray(deaths) = headers?.inner().get(&ShortString::from(DEATH_HEADER))?
    else {
        return None;
    };
    let AMQPValue::FieldTable(latest) = deaths.as_slice().first()? else {
        return None;
    };
    let AMQPValue::FieldArray(routing_keys) = latest.inner().get(&ShortString::from("routing-keys"))?
    else {
        return None;
    };

    match routing_keys.as_slice().first()? {
        AMQPValue::LongString(value) => Some(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        AMQPValue::ShortString(value) => Some(value.as_str().to_owned()),
        _ => None,
    }
}

/// Returns a header as an unsigned integer, if present and numeric.
pub fn header_u32(headers: Option<&FieldTable>, name: &str) -> Option<u32> {
    let value: i64 = match headers?.inner().get(&ShortString::from(name))? {
        AMQPValue::ShortShortInt(value) => i64::from(*value),
        AMQPValue::ShortShortUInt(value) => i64::from(*value),
        AMQPValue::ShortInt(value) => i64::from(*value),
        AMQPValue::ShortUInt(value) => i64::from(*value),
        AMQPValue::LongInt(value) => i64::from(*value),
        AMQPValue::LongUInt(value) => i64::from(*value),
        AMQPValue::LongLongInt(value) => *value,
        AMQPValue::LongString(value) => String::from_utf8_lossy(value.as_bytes())
            .trim()
            .parse()
            .ok()?,
        _ => return None,
    };

    u32::try_from(value).ok()
}

/// Derives the message type used to select a handler.
///
/// The routing key is taken from the [`ORIGINAL_ROUTING_KEY_HEADER`] when present, otherwise
/// from the delivery. A routing key starting with the configured prefix yields its remainder.
/// Otherwise the string body field named by `type_field` is used and, when absent, the routing
/// key itself.
#[derive(Debug, Clone)]
pub struct MessageTypeResolver {
    prefix: String,
    type_field: String,
}

impl MessageTypeResolver {
    /// Creates a resolver stripping `<routing_key_prefix>.` from routing keys.
    pub fn new(routing_key_prefix: &str, type_field: impl Into<String>) -> Self {
        Self {
            prefix: format!("{routing_key_prefix}."),
            type_field: type_field.into(),
        }
    }

    pub fn from_config(topology: &TopologyConfig) -> Self {
        Self::new(&topology.routing_key_prefix, topology.type_field.clone())
    }

    pub fn resolve(
        &self,
        routing_key: &str,
        headers: Option<&FieldTable>,
        message: &Message,
    ) -> String {
        let routing_key = header_string(headers, ORIGINAL_ROUTING_KEY_HEADER)
            .unwrap_or_else(|| routing_key.to_owned());

        if let Some(message_type) = routing_key.strip_prefix(&self.prefix) {
            if !message_type.is_empty() {
                return message_type.to_owned();
            }
        }

        match message.get(&self.type_field) {
            Some(Value::String(message_type)) if !message_type.is_empty() => message_type.clone(),
            _ => routing_key,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
