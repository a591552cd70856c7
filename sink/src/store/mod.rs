//! Persistence gateway used by handlers to write rows.

mod base;
pub mod memory;
pub mod postgres;

pub use base::{Inserter, Session, Store};
pub use memory::{MemoryStore, StoredRow};
pub use postgres::PgStore;
