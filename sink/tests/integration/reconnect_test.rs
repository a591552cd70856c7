use std::sync::Mutex;
use std::time::Duration;

use sink::concurrency::shutdown::create_shutdown_channel;
use sink::consumer::{ReconnectionManager, ReconnectionStatus, supervise};
use sink::error::{ErrorKind, SinkError, SinkResult};
use sink::workers::WorkerType;
use sink_config::shared::ReconnectionConfig;
use sink_telemetry::tracing::init_test_tracing;
use tokio::time::Instant;

const RETRY_DELAY: Duration = Duration::from_millis(5000);

fn manager() -> ReconnectionManager {
    ReconnectionManager::new(ReconnectionConfig {
        retry_delay_ms: RETRY_DELAY.as_millis() as u64,
    })
}

fn broker_down() -> SinkError {
    SinkError::from((ErrorKind::BrokerConnectionFailed, "Broker unreachable"))
}

#[tokio::test(start_paused = true)]
async fn consecutive_connect_failures_wait_the_fixed_delay_each_time() {
    init_test_tracing();
    const FAILURES: usize = 4;

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let manager = manager();
    let status_rx = manager.subscribe();
    let attempts = Mutex::new(Vec::new());
    let consumed = Mutex::new(0usize);

    let result = supervise(
        WorkerType::Primary,
        manager,
        shutdown_rx,
        || {
            let mut attempts = attempts.lock().unwrap();
            attempts.push(Instant::now());
            let attempt = attempts.len();

            async move {
                if attempt <= FAILURES {
                    return Err(broker_down());
                }

                SinkResult::Ok(attempt)
            }
        },
        |attempt, _shutdown_rx| {
            *consumed.lock().unwrap() += 1;

            async move {
                assert_eq!(attempt, FAILURES + 1);
                Ok(())
            }
        },
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(*consumed.lock().unwrap(), 1);
    assert_eq!(*status_rx.borrow(), ReconnectionStatus::Stopped);

    let attempts = attempts.into_inner().unwrap();
    assert_eq!(attempts.len(), FAILURES + 1);
    let waits: Vec<Duration> = attempts
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect();
    assert_eq!(waits, vec![RETRY_DELAY; FAILURES]);
}

#[tokio::test(start_paused = true)]
async fn consumption_failure_reconnects_after_the_delay() {
    init_test_tracing();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let connects = Mutex::new(Vec::new());

    let result = supervise(
        WorkerType::DeadLetter,
        manager(),
        shutdown_rx,
        || {
            connects.lock().unwrap().push(Instant::now());
            async { SinkResult::Ok(()) }
        },
        |(), _shutdown_rx| {
            let first = connects.lock().unwrap().len() == 1;

            async move {
                if first {
                    return Err(SinkError::from((
                        ErrorKind::ChannelRecycled,
                        "Channel recycled",
                    )));
                }

                Ok(())
            }
        },
    )
    .await;

    assert!(result.is_ok());
    let connects = connects.into_inner().unwrap();
    assert_eq!(connects.len(), 2);
    assert_eq!(connects[1].duration_since(connects[0]), RETRY_DELAY);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_stops_without_retrying() {
    init_test_tracing();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let manager = manager();
    let status_rx = manager.subscribe();
    let connects = Mutex::new(0usize);

    let result = supervise(
        WorkerType::Primary,
        manager,
        shutdown_rx,
        || {
            *connects.lock().unwrap() += 1;
            async {
                SinkResult::<()>::Err(SinkError::from((
                    ErrorKind::BrokerAuthenticationFailed,
                    "Broker refused the credentials",
                )))
            }
        },
        |(), _shutdown_rx| async { Ok(()) },
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BrokerAuthenticationFailed);
    assert_eq!(*connects.lock().unwrap(), 1);
    assert!(matches!(
        *status_rx.borrow(),
        ReconnectionStatus::Failed { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_the_reconnection_wait() {
    init_test_tracing();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let manager = manager();
    let mut status_rx = manager.subscribe();

    let worker = tokio::spawn(supervise(
        WorkerType::Primary,
        manager,
        shutdown_rx,
        || async { SinkResult::<()>::Err(broker_down()) },
        |(), _shutdown_rx| async { Ok(()) },
    ));

    status_rx
        .wait_for(|status| matches!(status, ReconnectionStatus::Reconnecting { .. }))
        .await
        .unwrap();
    let waiting_since = Instant::now();
    shutdown_tx.shutdown().unwrap();

    assert!(worker.await.unwrap().is_ok());
    assert!(waiting_since.elapsed() < RETRY_DELAY);
    assert_eq!(*status_rx.borrow(), ReconnectionStatus::Stopped);
}
