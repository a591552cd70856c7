use secrecy::SecretString;
use sink_config::shared::{PgConnectionConfig, TlsConfig};
use sink_postgres::sqlx::test_utils::{create_pg_database, drop_pg_database};
use sqlx::PgPool;
use uuid::Uuid;

/// Returns the connection settings of the local test Postgres with a fresh database name.
///
/// Read from `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and the
/// optional `TESTS_DATABASE_PASSWORD`.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig::disabled(),
    }
}

/// A throwaway database on the local test Postgres.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    pub async fn spawn() -> Self {
        let config = local_pg_connection_config();
        let pool = create_pg_database(&config).await;

        Self { config, pool }
    }

    /// Closes the pool and drops the database.
    pub async fn destroy(self) {
        self.pool.close().await;
        drop_pg_database(&self.config).await;
    }
}
