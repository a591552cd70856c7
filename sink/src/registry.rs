//! Registry mapping message types to the handlers persisting them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sink_postgres::TableName;
use tracing::{debug, error, warn};

use crate::envelope::Message;
use crate::error::{ErrorCategory, ErrorKind, SinkResult};
use crate::projection::Projection;
use crate::store::Inserter;

/// Turns a message into rows written through the passed [`Inserter`].
///
/// Handlers must not have side effects other than the writes issued through `store`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message, store: &mut dyn Inserter) -> SinkResult<()>;
}

/// Handler inserting a single projection into a fixed table.
pub struct ProjectionHandler<F> {
    table: TableName,
    project: F,
}

impl<F> ProjectionHandler<F>
where
    F: Fn(&Message) -> SinkResult<Projection> + Send + Sync,
{
    pub fn new(table: TableName, project: F) -> Self {
        Self { table, project }
    }
}

#[async_trait]
impl<F> MessageHandler for ProjectionHandler<F>
where
    F: Fn(&Message) -> SinkResult<Projection> + Send + Sync,
{
    async fn handle(&self, message: &Message, store: &mut dyn Inserter) -> SinkResult<()> {
        let projection = (self.project)(message)?;
        let rows = store.insert(&self.table, projection).await?;
        debug!(table = %self.table, rows, "inserted projection");

        Ok(())
    }
}

/// Severity used by [`LogOnlyHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Debug,
    Error,
}

/// Handler that acknowledges a message type without writing anything.
#[derive(Debug, Clone)]
pub struct LogOnlyHandler {
    severity: LogSeverity,
    note: &'static str,
}

impl LogOnlyHandler {
    pub fn debug(note: &'static str) -> Self {
        Self {
            severity: LogSeverity::Debug,
            note,
        }
    }

    pub fn error(note: &'static str) -> Self {
        Self {
            severity: LogSeverity::Error,
            note,
        }
    }
}

#[async_trait]
impl MessageHandler for LogOnlyHandler {
    async fn handle(&self, message: &Message, _store: &mut dyn Inserter) -> SinkResult<()> {
        match self.severity {
            LogSeverity::Debug => debug!(fields = message.len(), "{}", self.note),
            LogSeverity::Error => error!(fields = message.len(), "{}", self.note),
        }

        Ok(())
    }
}

/// Result of [`HandlerRegistry::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler processed the message.
    Handled,
    /// No handler is registered for the message type.
    Unhandled,
}

/// Mapping from message type to handler.
///
/// Built once at startup and shared read-only with the consumer afterwards.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `message_type`, replacing any previous registration.
    pub fn register<H>(&mut self, message_type: impl Into<String>, handler: H) -> &mut Self
    where
        H: MessageHandler + 'static,
    {
        let message_type = message_type.into();
        if self
            .handlers
            .insert(message_type.clone(), Arc::new(handler))
            .is_some()
        {
            debug!(%message_type, "replaced message handler");
        }

        self
    }

    /// Registers a [`ProjectionHandler`] inserting into `table`.
    pub fn register_projection<F>(
        &mut self,
        message_type: impl Into<String>,
        table: TableName,
        project: F,
    ) -> &mut Self
    where
        F: Fn(&Message) -> SinkResult<Projection> + Send + Sync + 'static,
    {
        self.register(message_type, ProjectionHandler::new(table, project))
    }

    pub fn contains(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the registered message types in sorted order.
    pub fn message_types(&self) -> Vec<&str> {
        let mut message_types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        message_types.sort_unstable();
        message_types
    }

    /// Runs the handler registered for `message_type`.
    ///
    /// An unknown message type is not an error. Handler failures are returned as
    /// [`ErrorKind::HandlerFailed`] with the original error as source, while persistence and
    /// connection errors raised through `store` are returned unchanged.
    pub async fn dispatch(
        &self,
        message_type: &str,
        message: &Message,
        store: &mut dyn Inserter,
    ) -> SinkResult<DispatchOutcome> {
        let Some(handler) = self.handlers.get(message_type) else {
            warn!(%message_type, "no handler registered for message type, skipping");
            return Ok(DispatchOutcome::Unhandled);
        };

        match handler.handle(message, store).await {
            Ok(()) => Ok(DispatchOutcome::Handled),
            Err(err)
                if matches!(
                    err.category(),
                    ErrorCategory::Persistence | ErrorCategory::Connection
                ) =>
            {
                Err(err)
            }
            Err(err) => Err(err.wrap(ErrorKind::HandlerFailed, "Message handler failed")),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("message_types", &self.message_types())
            .finish()
    }
}
