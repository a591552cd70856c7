use std::io::BufReader;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use sink_config::shared::{IntoConnectOptions, PgConnectionConfig, SINK_STORE_OPTIONS};
use sink_postgres::{TableName, build_insert_query};
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, warn};

use crate::error::{ErrorKind, SinkResult};
use crate::failpoints::{SESSION_COMMIT_FP, sink_fail_point};
use crate::projection::Projection;
use crate::sink_error;
use crate::store::base::{Inserter, Session, Store};

/// Spawns a background task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!(error = %err, "an error occurred on the postgres connection"),
            Ok(()) => debug!("postgres connection closed"),
        }
    }
    .instrument(span);

    // The connection ends when its client is dropped.
    tokio::spawn(task);
}

/// Builds the TLS configuration trusting the configured root certificates.
fn tls_config(pg_connection_config: &PgConnectionConfig) -> SinkResult<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader =
        BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        let cert = cert?;
        root_store.add(cert)?;
    }

    let tls_config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(tls_config)
}

/// [`Store`] opening one Postgres connection per message.
#[derive(Debug, Clone)]
pub struct PgStore {
    pg_connection_config: Arc<PgConnectionConfig>,
}

impl PgStore {
    pub fn new(pg_connection_config: PgConnectionConfig) -> Self {
        Self {
            pg_connection_config: Arc::new(pg_connection_config),
        }
    }

    async fn connect(&self) -> SinkResult<Client> {
        let config: Config = self.pg_connection_config.with_db(Some(&SINK_STORE_OPTIONS));

        let client = match self.pg_connection_config.tls.enabled {
            true => {
                let tls_config = tls_config(&self.pg_connection_config)?;
                let (client, connection) =
                    config.connect(MakeRustlsConnect::new(tls_config)).await?;
                spawn_postgres_connection::<MakeRustlsConnect>(connection);
                client
            }
            false => {
                let (client, connection) = config.connect(NoTls).await?;
                spawn_postgres_connection::<NoTls>(connection);
                client
            }
        };

        Ok(client)
    }
}

impl Store for PgStore {
    type Session = PgSession;

    fn name() -> &'static str {
        "postgres"
    }

    async fn scoped_connection(&self) -> SinkResult<PgSession> {
        let client = self.connect().await?;
        client.simple_query("begin;").await?;

        debug!("opened postgres session");

        Ok(PgSession { client })
    }
}

/// An open transaction on a dedicated Postgres connection.
///
/// Dropping the session drops the client, which closes the connection and with it the
/// transaction.
#[derive(Debug)]
pub struct PgSession {
    client: Client,
}

#[async_trait]
impl Inserter for PgSession {
    async fn insert(&mut self, table: &TableName, projection: Projection) -> SinkResult<u64> {
        let query = build_insert_query(table, projection.columns());
        debug!(%query, "executing insert");

        let params: Vec<&(dyn ToSql + Sync)> = projection
            .values()
            .iter()
            .map(|value| value as &(dyn ToSql + Sync))
            .collect();

        let statement = self.client.prepare(&query).await?;
        let rows = self.client.execute(&statement, &params).await?;

        Ok(rows)
    }
}

impl Session for PgSession {
    async fn commit(self) -> SinkResult<()> {
        sink_fail_point(SESSION_COMMIT_FP)?;

        self.client.simple_query("commit;").await?;

        Ok(())
    }

    async fn rollback(self) -> SinkResult<()> {
        if let Err(err) = self.client.simple_query("rollback;").await {
            warn!(error = %err, "failed to roll back postgres session, closing the connection");

            return Err(sink_error!(
                ErrorKind::InvalidState,
                "Rollback failed",
                detail = err.to_string(),
                source: err
            ));
        }

        Ok(())
    }
}
