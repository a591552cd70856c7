use sink_config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};

/// Creates a new Postgres database and returns a connection pool.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let without_db: PgConnectOptions = config.without_db(None);
    let mut connection = PgConnection::connect_with(&without_db)
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");

    let with_db: PgConnectOptions = config.with_db(None);
    PgPool::connect_with(with_db)
        .await
        .expect("Failed to connect to Postgres")
}

/// Drops a Postgres database and terminates all connections.
///
/// This function will not panic on errors, it logs them and continues, so test cleanup
/// doesn't fail when databases are already gone.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let without_db: PgConnectOptions = config.without_db(None);
    let mut connection = match PgConnection::connect_with(&without_db).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
            return;
        }
    };

    if let Err(e) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pg_stat_activity.pid)
            from pg_stat_activity
            where pg_stat_activity.datname = '{}'
            and pid <> pg_backend_pid();"#,
            config.name
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {}",
            config.name, e
        );
    }

    if let Err(e) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {}", config.name, e);
    }
}
