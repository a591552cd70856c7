use crate::envelope::Message;
use crate::error::SinkResult;
use crate::projection::{Projection, ProjectionBuilder};

/// Location attributes Twilio resolves for the sender's number.
const LOCATION_FIELDS: [&str; 4] = ["from_city", "from_state", "from_country", "from_zip"];

/// Projects an incoming SMS webhook into the messages table.
///
/// Location attributes and indexed media attachments are only included when present and not
/// empty.
pub fn twilio_sms_incoming(message: &Message) -> SinkResult<Projection> {
    let mut builder = ProjectionBuilder::new(message)
        .require("message_sid", "MessageSid")?
        .require("account_sid", "AccountSid")?
        .optional("messagingservice_sid", "MessagingServiceSid")
        .require("from_num", "From")?
        .require("to_num", "To")?
        .require("body", "Body")?
        .optional("num_segments", "NumSegments")
        .optional("num_media", "NumMedia")
        .optional("api_version", "ApiVersion")
        .optional("sender_name", "SenderName")
        .optional("wbor_message_id", "wbor_message_id");

    for field in LOCATION_FIELDS {
        builder = builder.non_empty(field, field);
    }

    Ok(builder
        .optional_indexed(&[
            ("media_content_type_", "MediaContentType"),
            ("media_url_", "MediaUrl"),
        ])
        .build())
}

/// Projects an outgoing SMS sent by the management service into the sent messages table.
pub fn twilio_sms_outgoing(message: &Message) -> SinkResult<Projection> {
    Ok(ProjectionBuilder::new(message)
        .require("wbor_message_id", "wbor_message_id")?
        .require("recipient_number", "recipient_number")?
        .require("body", "body")?
        .require_timestamp("timestamp", "timestamp")?
        .build())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::conversions::Cell;
    use crate::error::ErrorKind;

    fn message(value: Value) -> Message {
        match value {
            Value::Object(message) => message,
            _ => panic!("test message must be an object"),
        }
    }

    fn incoming() -> Value {
        json!({
            "MessageSid": "SM123",
            "AccountSid": "AC123",
            "MessagingServiceSid": "MG123",
            "From": "+12075551234",
            "To": "+12075550000",
            "Body": "play some jazz",
            "NumSegments": "1",
            "NumMedia": "1",
            "ApiVersion": "2010-04-01",
            "wbor_message_id": "0b8c8f8e",
            "from_city": "BRUNSWICK",
            "from_state": "",
            "MediaContentType0": "image/jpeg",
            "MediaUrl0": "https://api.twilio.com/media/0",
        })
    }

    #[test]
    fn test_incoming_sms_columns() {
        let projection = twilio_sms_incoming(&message(incoming())).unwrap();

        assert_eq!(
            projection.columns(),
            [
                "message_sid",
                "account_sid",
                "messagingservice_sid",
                "from_num",
                "to_num",
                "body",
                "num_segments",
                "num_media",
                "api_version",
                "wbor_message_id",
                "from_city",
                "media_content_type_0",
                "media_url_0",
            ]
        );
        assert_eq!(projection.values()[3], Cell::from("+12075551234"));
    }

    #[test]
    fn test_incoming_sms_requires_sender() {
        let mut incoming = message(incoming());
        incoming.remove("From");

        let err = twilio_sms_incoming(&incoming).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn test_outgoing_sms_parses_timestamp() {
        let projection = twilio_sms_outgoing(&message(json!({
            "wbor_message_id": "0b8c8f8e",
            "recipient_number": "+12075551234",
            "body": "thanks for listening",
            "timestamp": "2024-11-02T18:04:05Z",
        })))
        .unwrap();

        assert_eq!(projection.len(), 4);
        assert!(matches!(projection.values()[3], Cell::TimestampTz(_)));
    }
}
