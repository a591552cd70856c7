//! Shutdown signalling for the consumer workers.
//!
//! A single [`ShutdownTx`] notifies every subscribed worker. Workers observe the signal between
//! deliveries and while waiting to reconnect, so a delivery that is being processed always
//! completes before its consumer stops.

use std::sync::Arc;

use tokio::sync::watch;

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<()>;

/// Sender side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<()>>);

impl ShutdownTx {
    /// Notifies all receivers that they should stop.
    ///
    /// Fails when no receiver is alive anymore.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Returns a new receiver which is notified by the next [`ShutdownTx::shutdown`].
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(Arc::new(tx)), rx)
}
