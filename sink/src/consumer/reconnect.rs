//! Reconnection supervision of the broker consumers.
//!
//! Each consumer runs its connect, declare and consume sequence inside [`supervise`]. Any
//! failure that is not fatal puts the consumer back into the connecting state after a fixed
//! delay, without a retry limit, so broker downtime never ends the process.

use std::future::Future;
use std::time::{Duration, Instant};

use sink_config::shared::ReconnectionConfig;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{SinkError, SinkResult};
use crate::workers::base::WorkerType;

/// Current status of a supervised consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectionStatus {
    /// Opening the connection and declaring the topology for the first time.
    Connecting,
    /// Topology declared, consuming deliveries.
    Consuming,
    /// Waiting to reconnect after a failure.
    Reconnecting {
        /// Number of consecutive failures (1-indexed).
        attempt: u32,
    },
    /// Stopped after a shutdown request.
    Stopped,
    /// Stopped after an error that retrying cannot fix.
    Failed { reason: String },
}

/// Tracks the consecutive failures of a consumer.
#[derive(Debug)]
pub struct ReconnectionState {
    pub status: ReconnectionStatus,
    pub attempt_count: u32,
    pub first_failure_time: Option<Instant>,
    pub last_error: Option<SinkError>,
}

impl ReconnectionState {
    pub fn new() -> Self {
        Self {
            status: ReconnectionStatus::Connecting,
            attempt_count: 0,
            first_failure_time: None,
            last_error: None,
        }
    }

    pub fn record_failure(&mut self, error: SinkError) {
        if self.first_failure_time.is_none() {
            self.first_failure_time = Some(Instant::now());
        }
        self.attempt_count += 1;
        self.last_error = Some(error);
        self.status = ReconnectionStatus::Reconnecting {
            attempt: self.attempt_count,
        };
    }

    pub fn record_success(&mut self) {
        self.status = ReconnectionStatus::Consuming;
        self.attempt_count = 0;
        self.first_failure_time = None;
        self.last_error = None;
    }

    pub fn elapsed_since_first_failure(&self) -> Option<Duration> {
        self.first_failure_time.map(|t| t.elapsed())
    }
}

impl Default for ReconnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether and when a consumer reconnects, and publishes its status.
#[derive(Debug)]
pub struct ReconnectionManager {
    config: ReconnectionConfig,
    state: ReconnectionState,
    status_tx: watch::Sender<ReconnectionStatus>,
}

impl ReconnectionManager {
    pub fn new(config: ReconnectionConfig) -> Self {
        let (status_tx, _) = watch::channel(ReconnectionStatus::Connecting);

        Self {
            config,
            state: ReconnectionState::new(),
            status_tx,
        }
    }

    /// Returns a receiver observing every status change.
    pub fn subscribe(&self) -> watch::Receiver<ReconnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> &ReconnectionState {
        &self.state
    }

    /// Returns `true` unless `error` can never be fixed by reconnecting.
    pub fn should_retry(&self, error: &SinkError) -> bool {
        !error.kinds().iter().any(|kind| kind.is_fatal())
    }

    /// Returns the fixed delay waited before every reconnection attempt.
    pub fn retry_delay(&self) -> Duration {
        self.config.retry_delay()
    }

    pub fn record_failure(&mut self, error: SinkError) {
        self.state.record_failure(error);
        self.publish();
    }

    pub fn record_success(&mut self) {
        self.state.record_success();
        self.publish();
    }

    pub fn mark_stopped(&mut self) {
        self.state.status = ReconnectionStatus::Stopped;
        self.publish();
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.state.status = ReconnectionStatus::Failed { reason };
        self.publish();
    }

    pub fn attempt_count(&self) -> u32 {
        self.state.attempt_count
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.state.status.clone());
    }
}

/// Runs `connect` followed by `consume` until shutdown or a fatal error.
///
/// `connect` opens the broker connection and declares the topology. `consume` receives its
/// output and processes deliveries until it fails or observes the shutdown signal, in which
/// case it returns `Ok`. After every failure the supervisor waits the configured delay and
/// starts over with `connect`. The wait and the connection attempt are cut short by a shutdown.
pub async fn supervise<T, C, CFut, R, RFut>(
    worker_type: WorkerType,
    mut manager: ReconnectionManager,
    mut shutdown_rx: ShutdownRx,
    mut connect: C,
    mut consume: R,
) -> SinkResult<()>
where
    C: FnMut() -> CFut,
    CFut: Future<Output = SinkResult<T>>,
    R: FnMut(T, ShutdownRx) -> RFut,
    RFut: Future<Output = SinkResult<()>>,
{
    loop {
        let connected = tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!(worker = %worker_type, "shutdown requested while connecting");
                manager.mark_stopped();

                return Ok(());
            }
            connected = connect() => connected,
        };

        let result = match connected {
            Ok(connected) => {
                if manager.attempt_count() > 0 {
                    let downtime = manager
                        .state()
                        .elapsed_since_first_failure()
                        .unwrap_or_default();
                    info!(
                        worker = %worker_type,
                        attempts = manager.attempt_count(),
                        total_downtime_ms = downtime.as_millis() as u64,
                        "reconnection successful, resuming consumption"
                    );
                }
                manager.record_success();

                consume(connected, shutdown_rx.clone()).await
            }
            Err(err) => Err(err),
        };

        let err = match result {
            Ok(()) => {
                info!(worker = %worker_type, "consumer stopped");
                manager.mark_stopped();

                return Ok(());
            }
            Err(err) => err,
        };

        if !manager.should_retry(&err) {
            error!(
                worker = %worker_type,
                error = %err,
                "non-retryable error, stopping consumer"
            );
            manager.mark_failed(err.to_string());

            return Err(err);
        }

        manager.record_failure(err.clone());
        let delay = manager.retry_delay();

        warn!(
            worker = %worker_type,
            error = %err,
            attempt = manager.attempt_count(),
            delay_ms = delay.as_millis() as u64,
            "consumer disconnected, reconnecting after delay"
        );

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!(worker = %worker_type, "shutdown requested while waiting to reconnect");
                manager.mark_stopped();

                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn error(kind: ErrorKind) -> SinkError {
        SinkError::from((kind, "test error"))
    }

    #[test]
    fn test_state_tracks_consecutive_failures() {
        let mut state = ReconnectionState::new();

        state.record_failure(error(ErrorKind::BrokerConnectionFailed));
        state.record_failure(error(ErrorKind::BrokerChannelFailed));

        assert_eq!(
            state.status,
            ReconnectionStatus::Reconnecting { attempt: 2 }
        );
        assert!(state.first_failure_time.is_some());

        state.record_success();

        assert_eq!(state.status, ReconnectionStatus::Consuming);
        assert_eq!(state.attempt_count, 0);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_fatal_errors_are_not_retried() {
        let manager = ReconnectionManager::new(ReconnectionConfig::default());

        assert!(manager.should_retry(&error(ErrorKind::BrokerConnectionFailed)));
        assert!(manager.should_retry(&error(ErrorKind::StoreConnectionFailed)));
        assert!(manager.should_retry(&error(ErrorKind::Unknown)));
        assert!(!manager.should_retry(&error(ErrorKind::BrokerAuthenticationFailed)));
        assert!(!manager.should_retry(&error(ErrorKind::TopologyMismatch)));
    }

    #[test]
    fn test_delay_is_fixed() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig { retry_delay_ms: 250 });

        manager.record_failure(error(ErrorKind::BrokerConnectionFailed));
        let first = manager.retry_delay();
        for _ in 0..10 {
            manager.record_failure(error(ErrorKind::BrokerConnectionFailed));
        }

        assert_eq!(first, Duration::from_millis(250));
        assert_eq!(manager.retry_delay(), first);
    }

    #[test]
    fn test_status_changes_are_published() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig::default());
        let status_rx = manager.subscribe();

        manager.record_failure(error(ErrorKind::BrokerConnectionFailed));
        assert_eq!(
            *status_rx.borrow(),
            ReconnectionStatus::Reconnecting { attempt: 1 }
        );

        manager.mark_failed("boom".to_owned());
        assert_eq!(
            *status_rx.borrow(),
            ReconnectionStatus::Failed {
                reason: "boom".to_owned()
            }
        );
    }
}
