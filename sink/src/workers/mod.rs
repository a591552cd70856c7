//! Background workers running the consumers.

pub mod base;
pub mod consumer;

pub use base::{WorkerHandle, WorkerType};
pub use consumer::ConsumerWorkerHandle;
