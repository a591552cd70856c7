use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A queue or exchange name is empty.
    #[error("`{0}` cannot be empty")]
    EmptyName(&'static str),
    /// The primary queue message TTL is zero.
    #[error("`message_ttl_ms` must be greater than zero")]
    MessageTtlZero,
    /// The consumer prefetch window is zero.
    #[error("`prefetch_count` must be greater than zero")]
    PrefetchCountZero,
    /// The dead-letter queue would receive the messages it republishes.
    #[error("`dead_letter_queue` must differ from `primary_queue`, both are `{0}`")]
    DeadLetterQueueIsPrimary(String),
    /// The parking queue collides with one of the other queues.
    #[error("`parking_queue` must differ from the primary and dead-letter queues, got `{0}`")]
    ParkingQueueCollision(String),
    /// A retry ceiling of zero would park every dead-lettered message.
    #[error("`max_retries` must be greater than zero when set")]
    MaxRetriesZero,
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}
