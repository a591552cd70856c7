use serde::{Deserialize, Serialize};

/// Target tables of the built-in handlers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Incoming SMS messages.
    pub messages: String,
    /// Outgoing SMS messages.
    pub sent_messages: String,
    /// Messages and images sent through the GroupMe bot.
    pub groupme: String,
    /// Callbacks received from GroupMe.
    pub groupme_callbacks: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            messages: "messages".to_string(),
            sent_messages: "sent_sms".to_string(),
            groupme: "groupme".to_string(),
            groupme_callbacks: "groupme_callbacks".to_string(),
        }
    }
}
