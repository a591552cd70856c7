use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use lapin::BasicProperties;
use lapin::types::FieldTable;
use tokio::sync::{Mutex, Notify};

use crate::broker::Publisher;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::test_utils::notify::TimedNotify;

/// A message recorded by [`TestPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Bytes,
    pub headers: FieldTable,
    pub properties: BasicProperties,
}

#[derive(Debug, Default)]
struct Inner {
    published: Vec<PublishedMessage>,
    attempts: usize,
    failures_left: usize,
}

/// [`Publisher`] keeping every published message in memory.
#[derive(Debug, Clone, Default)]
pub struct TestPublisher {
    inner: Arc<Mutex<Inner>>,
    published_notify: Arc<Notify>,
}

impl TestPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` publishes fail as if the channel was lost.
    pub async fn fail_next_publishes(&self, count: usize) {
        self.inner.lock().await.failures_left = count;
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.inner.lock().await.published.clone()
    }

    pub async fn attempts(&self) -> usize {
        self.inner.lock().await.attempts
    }

    /// Returns a notifier woken after every successful publish.
    pub fn notify_on_publish(&self) -> TimedNotify {
        TimedNotify::new(self.published_notify.clone())
    }
}

impl Publisher for TestPublisher {
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> impl Future<Output = SinkResult<()>> + Send {
        let inner = self.inner.clone();
        let published_notify = self.published_notify.clone();
        let message = PublishedMessage {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            body: Bytes::copy_from_slice(body),
            headers: properties.headers().clone().unwrap_or_default(),
            properties,
        };

        async move {
            let mut inner = inner.lock().await;
            inner.attempts += 1;

            if inner.failures_left > 0 {
                inner.failures_left -= 1;

                return Err(SinkError::from((
                    ErrorKind::BrokerChannelFailed,
                    "Injected publish failure",
                )));
            }

            inner.published.push(message);
            published_notify.notify_waiters();

            Ok(())
        }
    }
}
