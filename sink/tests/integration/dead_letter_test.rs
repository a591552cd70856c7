use lapin::BasicProperties;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use sink::consumer::republish;
use sink::envelope::{ORIGINAL_ROUTING_KEY_HEADER, RETRY_COUNT_HEADER, header_string, header_u32};
use sink::error::ErrorKind;
use sink::test_utils::publisher::TestPublisher;
use sink_config::shared::TopologyConfig;
use sink_telemetry::tracing::init_test_tracing;

/// Bytes that are neither valid UTF-8 nor JSON must survive the cycle untouched.
const BODY: &[u8] = b"{\"type\":\"demo.create\",\"id\":\"42\"}\xff\x00trailing";

fn with_headers(headers: Option<FieldTable>) -> BasicProperties {
    match headers {
        Some(headers) => BasicProperties::default().with_headers(headers),
        None => BasicProperties::default(),
    }
}

#[tokio::test]
async fn republish_preserves_body_bytes_once_per_delivery() {
    init_test_tracing();
    let publisher = TestPublisher::new();
    let topology = TopologyConfig::default();

    let plan = republish(
        &publisher,
        &topology,
        "source.demo.create",
        &BasicProperties::default(),
        BODY,
    )
    .await
    .unwrap();

    let published = publisher.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].body.as_ref(), BODY);
    assert_eq!(published[0].exchange, "");
    assert_eq!(published[0].routing_key, topology.primary_queue);
    assert_eq!(published[0].headers, plan.headers);
    assert_eq!(
        header_string(Some(&published[0].headers), ORIGINAL_ROUTING_KEY_HEADER).as_deref(),
        Some("source.demo.create")
    );
    assert_eq!(
        header_u32(Some(&published[0].headers), RETRY_COUNT_HEADER),
        Some(1)
    );
}

#[tokio::test]
async fn repeated_cycles_count_retries_and_keep_the_original_key() {
    init_test_tracing();
    let publisher = TestPublisher::new();
    let topology = TopologyConfig::default();

    let mut headers: Option<FieldTable> = None;
    for _ in 0..3 {
        let plan = republish(&publisher, &topology, "postgres", &with_headers(headers), BODY)
            .await
            .unwrap();
        headers = Some(plan.headers);
    }

    let published = publisher.published().await;
    assert_eq!(published.len(), 3);
    assert!(published.iter().all(|message| message.body.as_ref() == BODY));

    let last = &published[2].headers;
    assert_eq!(header_u32(Some(last), RETRY_COUNT_HEADER), Some(3));
    // The first cycle saw `postgres` as routing key, nothing better is known.
    assert_eq!(
        header_string(Some(last), ORIGINAL_ROUTING_KEY_HEADER).as_deref(),
        Some("postgres")
    );
}

#[tokio::test]
async fn ceiling_routes_to_parking_queue() {
    init_test_tracing();
    let publisher = TestPublisher::new();
    let topology = TopologyConfig {
        max_retries: Some(2),
        ..Default::default()
    };
    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from(ORIGINAL_ROUTING_KEY_HEADER),
        AMQPValue::LongString(LongString::from("source.demo.create".to_owned())),
    );

    let first = republish(&publisher, &topology, "postgres", &with_headers(Some(headers)), BODY)
        .await
        .unwrap();
    let second = republish(
        &publisher,
        &topology,
        "postgres",
        &with_headers(Some(first.headers.clone())),
        BODY,
    )
        .await
        .unwrap();

    assert!(!first.parked);
    assert!(second.parked);

    let published = publisher.published().await;
    assert_eq!(published[0].routing_key, topology.primary_queue);
    assert_eq!(published[1].routing_key, topology.parking_queue);
    assert_eq!(published[1].body.as_ref(), BODY);
}

#[tokio::test]
async fn failed_publish_is_reported() {
    init_test_tracing();
    let publisher = TestPublisher::new();
    publisher.fail_next_publishes(1).await;
    let topology = TopologyConfig::default();

    let err = republish(&publisher, &topology, "postgres", &BasicProperties::default(), BODY)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BrokerChannelFailed);
    assert_eq!(publisher.attempts().await, 1);
    assert!(publisher.published().await.is_empty());

    republish(&publisher, &topology, "postgres", &BasicProperties::default(), BODY)
        .await
        .unwrap();
    assert_eq!(publisher.published().await.len(), 1);
}

#[tokio::test]
async fn republish_keeps_message_properties() {
    init_test_tracing();
    let publisher = TestPublisher::new();
    let topology = TopologyConfig::default();
    let properties = BasicProperties::default()
        .with_content_type(ShortString::from("application/json"))
        .with_message_id(ShortString::from("0b8c8f8e"))
        .with_timestamp(1_700_000_000);

    republish(&publisher, &topology, "source.demo.create", &properties, BODY)
        .await
        .unwrap();

    let published = publisher.published().await;
    let republished = &published[0].properties;
    assert_eq!(
        republished.content_type().as_ref().map(ShortString::as_str),
        Some("application/json")
    );
    assert_eq!(
        republished.message_id().as_ref().map(ShortString::as_str),
        Some("0b8c8f8e")
    );
    assert_eq!(republished.timestamp(), &Some(1_700_000_000));
    assert_eq!(republished.headers().as_ref(), Some(&published[0].headers));
}
