use std::future::Future;

use async_trait::async_trait;
use sink_postgres::TableName;

use crate::error::SinkResult;
use crate::projection::Projection;

/// Parameterized insert primitive handed to message handlers.
///
/// Handlers only ever see this trait, so they cannot commit, roll back or open connections
/// of their own.
#[async_trait]
pub trait Inserter: Send {
    /// Inserts one row into `table` and returns the number of affected rows.
    ///
    /// Column identifiers are quoted, values are sent as bind parameters. Rejections by the
    /// store surface as persistence errors with the store error kept as source.
    async fn insert(&mut self, table: &TableName, projection: Projection) -> SinkResult<u64>;
}

/// A store connection scoped to a single message.
///
/// A session is opened inside a transaction. Committing or rolling back consumes it and
/// releases the connection. Dropping a session that was neither committed nor rolled back
/// closes the connection, which discards the open transaction.
pub trait Session: Inserter + Sized {
    fn commit(self) -> impl Future<Output = SinkResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = SinkResult<()>> + Send;
}

/// Source of [`Session`]s.
pub trait Store {
    type Session: Session;

    /// Returns the name of the store.
    fn name() -> &'static str;

    /// Opens a connection and begins a transaction on it.
    ///
    /// A failure means the message could not be processed at all and must not be
    /// acknowledged.
    fn scoped_connection(&self) -> impl Future<Output = SinkResult<Self::Session>> + Send;
}
