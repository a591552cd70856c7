//! Broker consumers of the sink.
//!
//! The [`primary::PrimaryConsumer`] persists messages of the primary queue and the
//! [`dead_letter::DeadLetterConsumer`] feeds expired messages back into it. Both run under
//! [`reconnect::supervise`].

pub mod dead_letter;
pub mod primary;
pub mod processor;
pub mod reconnect;

pub use dead_letter::{DeadLetterConsumer, Republish, plan_republish, republish};
pub use primary::PrimaryConsumer;
pub use processor::{DeliveryOutcome, DeliveryProcessor};
pub use reconnect::{ReconnectionManager, ReconnectionState, ReconnectionStatus, supervise};
