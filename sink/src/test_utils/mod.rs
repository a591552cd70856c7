//! Utilities for testing the sink without a broker.
//!
//! - [`database`] creates throwaway databases on the local test Postgres
//! - [`publisher`] records what the dead-letter pump publishes
//! - [`envelope`] builds bodies, headers and configurations
//! - [`notify`] waits on notifications with a timeout
//! - [`failpoints`] configures fail points for the duration of a test
//!
//! The in-memory store lives in [`crate::store::memory`] and is re-exported here.

#[cfg(feature = "test-utils")]
pub mod database;
pub mod envelope;
pub mod failpoints;
pub mod notify;
pub mod publisher;

pub use crate::store::memory::{MemoryStore, StoredRow};
