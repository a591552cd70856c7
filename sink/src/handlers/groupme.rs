use serde_json::Value;

use crate::envelope::Message;
use crate::error::SinkResult;
use crate::projection::{Projection, ProjectionBuilder};

/// Projects a text message sent through the GroupMe bot.
///
/// Every field is optional, bot status messages can come without text.
pub fn groupme_message(message: &Message) -> SinkResult<Projection> {
    Ok(ProjectionBuilder::new(message)
        .optional("text", "text")
        .optional("bot_id", "bot_id")
        .optional("code", "statuscode")
        .optional("type", "type")
        .optional("wbor_message_id", "wbor_message_id")
        .optional("picture_url", "picture_url")
        .optional("source", "source")
        .build())
}

/// Projects an image sent through the GroupMe bot.
pub fn groupme_image(message: &Message) -> SinkResult<Projection> {
    Ok(ProjectionBuilder::new(message)
        .optional("raw_img", "raw_img")
        .optional("bot_id", "bot_id")
        .optional("code", "statuscode")
        .optional("type", "type")
        .optional("wbor_message_id", "wbor_message_id")
        .require("picture_url", "picture_url")?
        .optional("text", "text")
        .optional("source", "source")
        .build())
}

/// Projects a callback GroupMe sends for every message posted to a group.
///
/// Attachments are stored as JSON, `created_at` is a Unix epoch.
pub fn groupme_callback(message: &Message) -> SinkResult<Projection> {
    Ok(ProjectionBuilder::new(message)
        .json_or("attachments", "attachments", Value::Array(Vec::new()))
        .optional("avatar_url", "avatar_url")
        .require_epoch("created_at", "created_at")?
        .require("group_id", "group_id")?
        .require("id", "id")?
        .optional("name", "name")
        .optional("sender_id", "sender_id")
        .optional("sender_type", "sender_type")
        .optional("source_guid", "source_guid")
        .optional("system", "system")
        .optional("text", "text")
        .optional("user_id", "user_id")
        .build())
}
