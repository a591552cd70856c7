//! Postgres helpers shared by the sink crates.
//!
//! Identifier quoting and statement building for the rows written by message handlers, plus
//! database lifecycle utilities for tests behind the `test-utils` feature.

mod insert;
mod schema;
#[cfg(feature = "test-utils")]
pub mod sqlx;

pub use insert::build_insert_query;
pub use schema::{TableName, TableNameError};
