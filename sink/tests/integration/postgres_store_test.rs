use serde_json::json;
use sink::conversions::Cell;
use sink::error::ErrorKind;
use sink::projection::ProjectionBuilder;
use sink::store::{Inserter, PgStore, Session, Store};
use sink::test_utils::database::TestDatabase;
use sink_postgres::TableName;
use sink_telemetry::tracing::init_test_tracing;
use sqlx::Row;

async fn create_messages_table(database: &TestDatabase) {
    sqlx::query(
        r#"create table public.messages (
            id bigserial primary key,
            message_sid text not null unique,
            "From" text not null,
            num_media integer,
            date_created timestamptz
        )"#,
    )
    .execute(&database.pool)
    .await
    .unwrap();
}

#[ignore = "requires TESTS_DATABASE_* to point at a Postgres server"]
#[tokio::test(flavor = "multi_thread")]
async fn committed_row_is_visible_with_coerced_values() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    create_messages_table(&database).await;

    let store = PgStore::new(database.config.clone());
    let table: TableName = "messages".parse().unwrap();
    let message = json!({
        "MessageSid": "SM1",
        "From": "+15550100",
        "NumMedia": "2",
        "DateCreated": "2024-05-01T12:00:00Z"
    })
    .as_object()
    .cloned()
    .unwrap();
    let projection = ProjectionBuilder::new(&message)
        .require("message_sid", "MessageSid")
        .unwrap()
        .require("From", "From")
        .unwrap()
        .optional("num_media", "NumMedia")
        .optional("date_created", "DateCreated")
        .build();

    let mut session = store.scoped_connection().await.unwrap();
    assert_eq!(session.insert(&table, projection).await.unwrap(), 1);
    session.commit().await.unwrap();

    let row = sqlx::query(r#"select message_sid, "From", num_media from public.messages"#)
        .fetch_one(&database.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("message_sid"), "SM1");
    assert_eq!(row.get::<String, _>("From"), "+15550100");
    assert_eq!(row.get::<i32, _>("num_media"), 2);

    database.destroy().await;
}

#[ignore = "requires TESTS_DATABASE_* to point at a Postgres server"]
#[tokio::test(flavor = "multi_thread")]
async fn constraint_violation_is_classified_and_rolled_back() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    create_messages_table(&database).await;

    let store = PgStore::new(database.config.clone());
    let table: TableName = "messages".parse().unwrap();
    let message = serde_json::Map::new();
    let row = || {
        ProjectionBuilder::new(&message)
            .value("message_sid", "SM1")
            .value("From", Cell::from("+15550100"))
            .build()
    };

    let mut session = store.scoped_connection().await.unwrap();
    session.insert(&table, row()).await.unwrap();
    session.commit().await.unwrap();

    let mut session = store.scoped_connection().await.unwrap();
    let err = session.insert(&table, row()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    session.rollback().await.unwrap();

    let count: i64 = sqlx::query_scalar("select count(*) from public.messages")
        .fetch_one(&database.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    database.destroy().await;
}

#[tokio::test]
async fn unreachable_store_fails_with_a_connection_error() {
    init_test_tracing();
    let config = sink::test_utils::envelope::sink_config("127.0.0.1", 1, 1);
    let store = PgStore::new(config.store);

    let err = store.scoped_connection().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreConnectionFailed);
}
