use std::time::Duration;

use sink::consumer::ReconnectionStatus;
use sink::handlers::default_registry;
use sink::pipeline::Sink;
use sink::test_utils::MemoryStore;
use sink::test_utils::envelope::sink_config;
use sink_telemetry::tracing::init_test_tracing;

/// Loopback port refusing every connection.
const CLOSED_PORT: u16 = 1;

#[tokio::test(flavor = "multi_thread")]
async fn sink_keeps_retrying_an_unreachable_broker_until_shutdown() {
    init_test_tracing();
    let mut config = sink_config("127.0.0.1", CLOSED_PORT, CLOSED_PORT);
    config.reconnection.retry_delay_ms = 50;
    let registry = default_registry(&config.tables).unwrap();
    let mut sink = Sink::new(config, MemoryStore::new(), registry);

    assert!(sink.status().is_none());
    sink.start().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let status = sink.status().unwrap();
            if matches!(status.primary, ReconnectionStatus::Reconnecting { attempt } if attempt >= 2)
                && matches!(status.dead_letter, ReconnectionStatus::Reconnecting { .. })
            {
                break;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("consumers never started reconnecting");

    tokio::time::timeout(Duration::from_secs(10), sink.shutdown_and_wait())
        .await
        .expect("sink did not stop after shutdown")
        .unwrap();
}

#[tokio::test]
async fn waiting_on_a_sink_that_never_started_returns_immediately() {
    init_test_tracing();
    let config = sink_config("127.0.0.1", CLOSED_PORT, CLOSED_PORT);
    let registry = default_registry(&config.tables).unwrap();
    let sink = Sink::new(config, MemoryStore::new(), registry);

    sink.wait().await.unwrap();
}
