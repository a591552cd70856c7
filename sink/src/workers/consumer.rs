use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::consumer::reconnect::ReconnectionStatus;
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;
use crate::workers::base::{WorkerHandle, WorkerType};

/// Handle of a spawned consumer worker.
#[derive(Debug)]
pub struct ConsumerWorkerHandle {
    worker_type: WorkerType,
    status_rx: watch::Receiver<ReconnectionStatus>,
    handle: Option<JoinHandle<SinkResult<()>>>,
}

impl ConsumerWorkerHandle {
    pub(crate) fn new(
        worker_type: WorkerType,
        status_rx: watch::Receiver<ReconnectionStatus>,
        handle: JoinHandle<SinkResult<()>>,
    ) -> Self {
        Self {
            worker_type,
            status_rx,
            handle: Some(handle),
        }
    }

    pub fn worker_type(&self) -> WorkerType {
        self.worker_type
    }
}

impl WorkerHandle<ReconnectionStatus> for ConsumerWorkerHandle {
    fn state(&self) -> ReconnectionStatus {
        self.status_rx.borrow().clone()
    }

    async fn wait(mut self) -> SinkResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                sink_error!(
                    ErrorKind::WorkerCancelled,
                    "Consumer worker was cancelled",
                    err
                )
            } else {
                sink_error!(ErrorKind::WorkerPanic, "Consumer worker panicked", err)
            }
        })??;

        Ok(())
    }
}
