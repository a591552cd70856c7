use std::sync::Arc;

use insta::assert_debug_snapshot;
use serde_json::json;
use sink::consumer::{DeliveryOutcome, DeliveryProcessor};
use sink::conversions::Cell;
use sink::envelope::{MessageTypeResolver, ORIGINAL_ROUTING_KEY_HEADER};
use sink::error::{ErrorKind, SinkResult};
use sink::projection::{Projection, ProjectionBuilder};
use sink::registry::HandlerRegistry;
use sink::test_utils::MemoryStore;
use sink::test_utils::envelope::{json_body, routing_key, string_headers};
use sink_config::shared::TopologyConfig;
use sink_telemetry::tracing::init_test_tracing;

fn demo_create(message: &sink::envelope::Message) -> SinkResult<Projection> {
    Ok(ProjectionBuilder::new(message)
        .require("record_id", "id")?
        .optional("name", "label")
        .build())
}

fn demo_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register_projection("demo.create", "demo_records".parse().unwrap(), demo_create);
    registry.register_projection("demo.broken", "demo_records".parse().unwrap(), |_| {
        Projection::from_parts(vec!["a".into(), "b".into()], vec![Cell::from("only one")])
    });

    registry
}

fn processor(store: &MemoryStore) -> DeliveryProcessor<MemoryStore> {
    DeliveryProcessor::new(
        store.clone(),
        Arc::new(demo_registry()),
        MessageTypeResolver::from_config(&TopologyConfig::default()),
    )
}

#[tokio::test]
async fn registered_message_is_committed_once_and_acknowledged() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.create"),
            None,
            &json_body(&json!({"id": "42", "label": "x"})),
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    let rows = store.committed_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].table.to_string(), "public.demo_records");
    assert_debug_snapshot!(rows[0].columns, @r#"
    [
        "record_id",
        "name",
    ]
    "#);
    assert_eq!(rows[0].values, vec![Cell::from("42"), Cell::from("x")]);
}

#[tokio::test]
async fn type_field_resolves_message_type_outside_the_prefix() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    let outcome = processor
        .process(
            "postgres",
            None,
            &json_body(&json!({"type": "demo.create", "id": "42", "label": "x"})),
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    let rows = store.committed_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns, ["record_id", "name"]);
    assert_eq!(rows[0].values, vec![Cell::from("42"), Cell::from("x")]);
}

#[tokio::test]
async fn absent_optional_field_is_omitted() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.create"),
            None,
            &json_body(&json!({"id": "42"})),
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    let rows = store.committed_rows().await;
    assert_eq!(rows[0].columns, ["record_id"]);
    assert_eq!(rows[0].values, vec![Cell::from("42")]);
}

#[tokio::test]
async fn republished_message_resolves_original_routing_key() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);
    let headers = string_headers(&[(ORIGINAL_ROUTING_KEY_HEADER, "source.demo.create")]);

    let outcome = processor
        .process(
            "postgres",
            Some(&headers),
            &json_body(&json!({"id": "7"})),
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    assert_eq!(store.committed_rows().await.len(), 1);
}

#[tokio::test]
async fn unregistered_message_is_acknowledged_without_inserts() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.unknown"),
            None,
            &json_body(&json!({"id": "1"})),
        )
        .await;

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    assert_eq!(store.insert_attempts().await, 0);
    assert!(store.committed_rows().await.is_empty());
}

#[tokio::test]
async fn undecodable_body_is_acknowledged_without_touching_the_store() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    for body in [&b"not json"[..], b"[1, 2]", b"\xff\xfe", b""] {
        for _ in 0..2 {
            let outcome = processor
                .process(&routing_key("demo.create"), None, body)
                .await;

            assert_eq!(outcome, DeliveryOutcome::Acknowledged);
        }
    }

    assert_eq!(store.sessions_opened().await, 0);
    assert_eq!(store.insert_attempts().await, 0);
}

#[tokio::test]
async fn mismatched_projection_is_withheld_without_insert() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.broken"),
            None,
            &json_body(&json!({"id": "1"})),
        )
        .await;

    let DeliveryOutcome::Withheld(err) = outcome else {
        panic!("expected a withheld delivery, got {outcome:?}");
    };
    assert_eq!(err.kind(), ErrorKind::HandlerFailed);
    assert_eq!(store.insert_attempts().await, 0);
    assert_eq!(store.rollbacks().await, 1);
    assert!(store.committed_rows().await.is_empty());
}

#[tokio::test]
async fn missing_required_field_is_withheld() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.create"),
            None,
            &json_body(&json!({"label": "x"})),
        )
        .await;

    assert!(matches!(outcome, DeliveryOutcome::Withheld(_)));
    assert!(store.committed_rows().await.is_empty());
}

#[tokio::test]
async fn rejected_insert_is_withheld_and_rolled_back() {
    init_test_tracing();
    let store = MemoryStore::new();
    store.fail_inserts_with(ErrorKind::ConstraintViolation).await;
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.create"),
            None,
            &json_body(&json!({"id": "42"})),
        )
        .await;

    let DeliveryOutcome::Withheld(err) = outcome else {
        panic!("expected a withheld delivery, got {outcome:?}");
    };
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(store.rollbacks().await, 1);
    assert!(store.committed_rows().await.is_empty());
}

#[tokio::test]
async fn failed_commit_is_withheld() {
    init_test_tracing();
    let store = MemoryStore::new();
    store.fail_commits_with(ErrorKind::StoreQueryFailed).await;
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.create"),
            None,
            &json_body(&json!({"id": "42"})),
        )
        .await;

    assert!(matches!(outcome, DeliveryOutcome::Withheld(_)));
    assert!(store.committed_rows().await.is_empty());
}

#[tokio::test]
async fn unreachable_store_rejects_the_delivery() {
    init_test_tracing();
    let store = MemoryStore::new();
    store.fail_next_connections(1).await;
    let processor = processor(&store);
    let body = json_body(&json!({"id": "42"}));

    let outcome = processor
        .process(&routing_key("demo.create"), None, &body)
        .await;

    let DeliveryOutcome::Rejected(err) = outcome else {
        panic!("expected a rejected delivery, got {outcome:?}");
    };
    assert_eq!(err.kind(), ErrorKind::StoreConnectionFailed);

    // The store is back for the redelivery.
    let outcome = processor
        .process(&routing_key("demo.create"), None, &body)
        .await;

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    assert_eq!(store.committed_rows().await.len(), 1);
}

#[tokio::test]
async fn lost_store_connection_during_insert_rejects_the_delivery() {
    init_test_tracing();
    let store = MemoryStore::new();
    store.fail_inserts_with(ErrorKind::StoreConnectionFailed).await;
    let processor = processor(&store);

    let outcome = processor
        .process(
            &routing_key("demo.create"),
            None,
            &json_body(&json!({"id": "42"})),
        )
        .await;

    assert!(matches!(outcome, DeliveryOutcome::Rejected(_)));
}
