use std::sync::Arc;

use serde_json::json;
use sink::consumer::{DeliveryOutcome, DeliveryProcessor};
use sink::envelope::MessageTypeResolver;
use sink::error::ErrorKind;
use sink::failpoints::{SESSION_COMMIT_FP, STORE_CONNECT_FP};
use sink::handlers::default_registry;
use sink::test_utils::MemoryStore;
use sink::test_utils::envelope::{json_body, routing_key};
use sink::test_utils::failpoints::CustomFailScenario;
use sink_config::shared::{TablesConfig, TopologyConfig};
use sink_telemetry::tracing::init_test_tracing;

fn processor(store: &MemoryStore) -> DeliveryProcessor<MemoryStore> {
    DeliveryProcessor::new(
        store.clone(),
        Arc::new(default_registry(&TablesConfig::default()).unwrap()),
        MessageTypeResolver::from_config(&TopologyConfig::default()),
    )
}

fn groupme_message() -> Vec<u8> {
    json_body(&json!({"text": "hello", "statuscode": "200", "uuid": "abc"}))
}

// Fail points are process global, both scenarios run in one test to keep them sequential.
#[tokio::test]
async fn injected_store_failures_settle_deliveries() {
    init_test_tracing();
    let store = MemoryStore::new();
    let processor = processor(&store);

    {
        let _scenario = CustomFailScenario::setup(&[(SESSION_COMMIT_FP, "1*return")]);

        let outcome = processor
            .process(&routing_key("groupme.msg"), None, &groupme_message())
            .await;

        let DeliveryOutcome::Withheld(err) = outcome else {
            panic!("expected a withheld delivery, got {outcome:?}");
        };
        assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
        assert!(store.committed_rows().await.is_empty());

        // The fail point fired once, the redelivery commits.
        let outcome = processor
            .process(&routing_key("groupme.msg"), None, &groupme_message())
            .await;
        assert_eq!(outcome, DeliveryOutcome::Acknowledged);
        assert_eq!(store.committed_rows().await.len(), 1);
    }

    {
        let _scenario = CustomFailScenario::setup(&[(STORE_CONNECT_FP, "return(connection)")]);

        let outcome = processor
            .process(&routing_key("groupme.msg"), None, &groupme_message())
            .await;

        let DeliveryOutcome::Rejected(err) = outcome else {
            panic!("expected a rejected delivery, got {outcome:?}");
        };
        assert_eq!(err.kind(), ErrorKind::StoreConnectionFailed);
        assert_eq!(store.committed_rows().await.len(), 1);
    }
}
