use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Exchanges, queues and consumption settings declared by the consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Topic exchange publishers send events to.
    #[serde(default = "default_source_exchange")]
    pub source_exchange: String,
    /// Routing key prefix of all events, the primary queue binds `<prefix>.#`.
    #[serde(default = "default_routing_key_prefix")]
    pub routing_key_prefix: String,
    #[serde(default = "default_primary_queue")]
    pub primary_queue: String,
    #[serde(default = "default_dead_letter_exchange")]
    pub dead_letter_exchange: String,
    #[serde(default = "default_dead_letter_queue")]
    pub dead_letter_queue: String,
    /// Time a message may stay unsettled in the primary queue before it is dead-lettered.
    #[serde(default = "default_message_ttl_ms")]
    pub message_ttl_ms: u32,
    /// Number of unacknowledged deliveries the broker pushes to a consumer.
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,
    /// Body field used as message type when the routing key does not carry one.
    #[serde(default = "default_type_field")]
    pub type_field: String,
    /// Number of republishes after which a dead-lettered message is parked.
    ///
    /// `None` republishes forever.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Durable queue receiving messages that exhausted `max_retries`.
    #[serde(default = "default_parking_queue")]
    pub parking_queue: String,
}

fn default_source_exchange() -> String {
    "source_exchange".to_string()
}

fn default_routing_key_prefix() -> String {
    "source".to_string()
}

fn default_primary_queue() -> String {
    "postgres".to_string()
}

fn default_dead_letter_exchange() -> String {
    "dead_letter_exchange".to_string()
}

fn default_dead_letter_queue() -> String {
    "dead_letter_queue".to_string()
}

fn default_message_ttl_ms() -> u32 {
    60_000
}

fn default_prefetch_count() -> u16 {
    16
}

fn default_type_field() -> String {
    "type".to_string()
}

fn default_parking_queue() -> String {
    "dead_letter_parking".to_string()
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            source_exchange: default_source_exchange(),
            routing_key_prefix: default_routing_key_prefix(),
            primary_queue: default_primary_queue(),
            dead_letter_exchange: default_dead_letter_exchange(),
            dead_letter_queue: default_dead_letter_queue(),
            message_ttl_ms: default_message_ttl_ms(),
            prefetch_count: default_prefetch_count(),
            type_field: default_type_field(),
            max_retries: None,
            parking_queue: default_parking_queue(),
        }
    }
}

impl TopologyConfig {
    /// Binding key of the primary queue on the source exchange.
    pub fn binding_key(&self) -> String {
        format!("{}.#", self.routing_key_prefix)
    }

    /// Prefix stripped from routing keys to obtain the message type.
    pub fn routing_key_prefix_with_separator(&self) -> String {
        format!("{}.", self.routing_key_prefix)
    }

    pub fn message_ttl(&self) -> Duration {
        Duration::from_millis(u64::from(self.message_ttl_ms))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let names = [
            ("source_exchange", &self.source_exchange),
            ("routing_key_prefix", &self.routing_key_prefix),
            ("primary_queue", &self.primary_queue),
            ("dead_letter_exchange", &self.dead_letter_exchange),
            ("dead_letter_queue", &self.dead_letter_queue),
            ("type_field", &self.type_field),
            ("parking_queue", &self.parking_queue),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyName(field));
            }
        }

        if self.message_ttl_ms == 0 {
            return Err(ValidationError::MessageTtlZero);
        }

        if self.prefetch_count == 0 {
            return Err(ValidationError::PrefetchCountZero);
        }

        if self.dead_letter_queue == self.primary_queue {
            return Err(ValidationError::DeadLetterQueueIsPrimary(
                self.primary_queue.clone(),
            ));
        }

        if let Some(max_retries) = self.max_retries {
            if max_retries == 0 {
                return Err(ValidationError::MaxRetriesZero);
            }

            if self.parking_queue == self.primary_queue
                || self.parking_queue == self.dead_letter_queue
            {
                return Err(ValidationError::ParkingQueueCollision(
                    self.parking_queue.clone(),
                ));
            }
        }

        Ok(())
    }
}
