use std::sync::Arc;

use async_trait::async_trait;
use sink_postgres::TableName;
use tokio::sync::Mutex;
use tracing::info;

use crate::conversions::Cell;
use crate::error::{ErrorKind, SinkResult};
use crate::failpoints::{SESSION_COMMIT_FP, STORE_CONNECT_FP, sink_fail_point};
use crate::projection::Projection;
use crate::sink_error;
use crate::store::base::{Inserter, Session, Store};

/// A row committed to a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub table: TableName,
    pub columns: Vec<String>,
    pub values: Vec<Cell>,
}

#[derive(Debug, Default)]
struct Inner {
    committed: Vec<StoredRow>,
    sessions_opened: usize,
    insert_attempts: usize,
    rollbacks: usize,
    failing_connections: usize,
    insert_failure: Option<ErrorKind>,
    commit_failure: Option<ErrorKind>,
}

/// In-memory [`Store`] for tests and local development.
///
/// Rows become visible only once their session commits. Failures can be injected for
/// connection attempts, inserts and commits to drive the error paths of the consumers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to [`Store::scoped_connection`] fail.
    pub async fn fail_next_connections(&self, count: usize) {
        self.inner.lock().await.failing_connections = count;
    }

    /// Makes every insert fail with an error of `kind`.
    pub async fn fail_inserts_with(&self, kind: ErrorKind) {
        self.inner.lock().await.insert_failure = Some(kind);
    }

    /// Makes every commit fail with an error of `kind`.
    pub async fn fail_commits_with(&self, kind: ErrorKind) {
        self.inner.lock().await.commit_failure = Some(kind);
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_connections = 0;
        inner.insert_failure = None;
        inner.commit_failure = None;
    }

    pub async fn committed_rows(&self) -> Vec<StoredRow> {
        self.inner.lock().await.committed.clone()
    }

    pub async fn sessions_opened(&self) -> usize {
        self.inner.lock().await.sessions_opened
    }

    pub async fn insert_attempts(&self) -> usize {
        self.inner.lock().await.insert_attempts
    }

    pub async fn rollbacks(&self) -> usize {
        self.inner.lock().await.rollbacks
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn name() -> &'static str {
        "memory"
    }

    async fn scoped_connection(&self) -> SinkResult<MemorySession> {
        sink_fail_point(STORE_CONNECT_FP)?;

        let mut inner = self.inner.lock().await;
        if inner.failing_connections > 0 {
            inner.failing_connections -= 1;

            return Err(sink_error!(
                ErrorKind::StoreConnectionFailed,
                "Memory store refused the connection"
            ));
        }

        inner.sessions_opened += 1;

        Ok(MemorySession {
            inner: self.inner.clone(),
            pending: Vec::new(),
        })
    }
}

/// Session of a [`MemoryStore`], buffering rows until commit.
#[derive(Debug)]
pub struct MemorySession {
    inner: Arc<Mutex<Inner>>,
    pending: Vec<StoredRow>,
}

#[async_trait]
impl Inserter for MemorySession {
    async fn insert(&mut self, table: &TableName, projection: Projection) -> SinkResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.insert_attempts += 1;

        if let Some(kind) = inner.insert_failure {
            return Err(sink_error!(
                kind,
                "Memory store rejected the row",
                format!("insert into {table} failed")
            ));
        }

        let (columns, values) = projection.into_parts();
        self.pending.push(StoredRow {
            table: table.clone(),
            columns,
            values,
        });

        Ok(1)
    }
}

impl Session for MemorySession {
    async fn commit(self) -> SinkResult<()> {
        sink_fail_point(SESSION_COMMIT_FP)?;

        let mut inner = self.inner.lock().await;
        if let Some(kind) = inner.commit_failure {
            return Err(sink_error!(kind, "Memory store rejected the commit"));
        }

        info!(rows = self.pending.len(), "committing rows to memory store");
        inner.committed.extend(self.pending);

        Ok(())
    }

    async fn rollback(self) -> SinkResult<()> {
        self.inner.lock().await.rollbacks += 1;

        Ok(())
    }
}
