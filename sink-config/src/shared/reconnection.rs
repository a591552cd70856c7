use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnection behavior shared by both broker consumers.
///
/// The delay is fixed: every failed connect, declare or consume attempt waits the same
/// amount of time before the next one, without jitter and without an attempt limit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconnectionConfig {
    /// Delay between attempts in milliseconds.
    ///
    /// Default: 5000ms
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    5000
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ReconnectionConfig {
    /// Returns the retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
