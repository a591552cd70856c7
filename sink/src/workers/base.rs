use std::fmt;
use std::future::Future;

use crate::error::SinkResult;

/// Kinds of workers run by the sink, one broker connection each.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerType {
    /// Consumes the primary queue and persists messages.
    Primary,
    /// Drains the dead-letter queue back into the primary queue.
    DeadLetter,
}

impl WorkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Primary => "primary",
            WorkerType::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle for monitoring and waiting on a running worker.
///
/// `S` is the type of the state snapshot exposed by the handle.
pub trait WorkerHandle<S> {
    /// Returns a snapshot of the worker state.
    fn state(&self) -> S;

    /// Waits for the worker to complete and returns its result.
    fn wait(self) -> impl Future<Output = SinkResult<()>> + Send;
}
