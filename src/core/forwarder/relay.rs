//! Stream relay from upstream to client with idle supervision
//!
//! A spawned task pumps upstream chunks into a bounded channel; the
//! channel's receiver is the client-facing body stream. If the client
//! disconnects the receiver drops, the next send fails, and the task
//! returns, dropping the upstream connection without recording a failure.
//! An idle timeout or upstream error mid-stream is recorded against the
//! provider and truncates the stream; it is never retried, the client
//! already holds partial output.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::core::health::HealthTracker;
use crate::core::types::Provider;
use crate::utils::error::{GatewayError, Result};

pub(crate) fn relay<S, E>(
    provider: Provider,
    health: Arc<HealthTracker>,
    first_chunk: Option<Bytes>,
    upstream: S,
    idle: Duration,
) -> impl Stream<Item = Result<Bytes>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Bytes>>(32);

    tokio::spawn(async move {
        tokio::pin!(upstream);

        if let Some(chunk) = first_chunk {
            if tx.send(Ok(chunk)).await.is_err() {
                debug!(provider = %provider.id, "client disconnected before relay start");
                return;
            }
        }

        loop {
            match timeout(idle, upstream.next()).await {
                Err(_) => {
                    health.record_failure(&provider);
                    warn!(
                        provider = %provider.id,
                        idle_secs = idle.as_secs(),
                        "idle timeout mid-stream, truncating response"
                    );
                    let _ = tx
                        .send(Err(GatewayError::Timeout(format!(
                            "provider {} idle for {:?} mid-stream",
                            provider.id, idle
                        ))))
                        .await;
                    break;
                }
                Ok(None) => {
                    debug!(provider = %provider.id, "upstream stream complete");
                    break;
                }
                Ok(Some(Err(e))) => {
                    health.record_failure(&provider);
                    warn!(
                        provider = %provider.id,
                        error = %e,
                        "upstream error mid-stream, truncating response"
                    );
                    let _ = tx
                        .send(Err(GatewayError::Upstream(format!(
                            "provider {} failed mid-stream: {}",
                            provider.id, e
                        ))))
                        .await;
                    break;
                }
                Ok(Some(Ok(chunk))) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        // Client went away; dropping the upstream stream
                        // cancels the in-flight call. Not a provider failure.
                        debug!(provider = %provider.id, "client disconnected mid-stream");
                        return;
                    }
                }
            }
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::test_util::provider;
    use futures::stream;

    fn chunks(items: Vec<std::result::Result<Bytes, String>>) -> impl Stream<Item = std::result::Result<Bytes, String>> + Send {
        stream::iter(items)
    }

    #[tokio::test]
    async fn relays_first_chunk_then_rest_in_order() {
        let health = Arc::new(HealthTracker::new());
        let body = relay(
            provider("p1", 0),
            Arc::clone(&health),
            Some(Bytes::from("one")),
            chunks(vec![Ok(Bytes::from("two")), Ok(Bytes::from("three"))]),
            Duration::from_secs(5),
        );

        let collected: Vec<_> = body.collect().await;
        let ok: Vec<Bytes> = collected.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(ok, vec![
            Bytes::from("one"),
            Bytes::from("two"),
            Bytes::from("three"),
        ]);
        assert_eq!(health.status("p1").consecutive_failures, 0);
    }

    #[tokio::test]
    async fn mid_stream_error_truncates_and_records_failure() {
        let health = Arc::new(HealthTracker::new());
        let body = relay(
            provider("p1", 0),
            Arc::clone(&health),
            Some(Bytes::from("partial")),
            chunks(vec![
                Ok(Bytes::from("more")),
                Err("connection reset".to_string()),
                Ok(Bytes::from("never delivered")),
            ]),
            Duration::from_secs(5),
        );

        let collected: Vec<_> = body.collect().await;
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].as_ref().unwrap(), &Bytes::from("partial"));
        assert_eq!(collected[1].as_ref().unwrap(), &Bytes::from("more"));
        assert!(collected[2].is_err());
        assert_eq!(health.status("p1").consecutive_failures, 1);
    }

    #[tokio::test]
    async fn idle_timeout_truncates_and_records_failure() {
        let health = Arc::new(HealthTracker::new());
        let stalled = stream::unfold((), |()| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some((Ok::<_, String>(Bytes::from("late")), ()))
        });
        let body = relay(
            provider("p1", 0),
            Arc::clone(&health),
            Some(Bytes::from("first")),
            stalled,
            Duration::from_millis(20),
        );

        let collected: Vec<_> = body.collect().await;
        assert_eq!(collected.len(), 2);
        assert!(collected[1].is_err());
        assert_eq!(health.status("p1").consecutive_failures, 1);
    }

    #[tokio::test]
    async fn dropped_receiver_is_not_a_failure() {
        let health = Arc::new(HealthTracker::new());
        let body = relay(
            provider("p1", 0),
            Arc::clone(&health),
            Some(Bytes::from("first")),
            chunks((0..100).map(|i| Ok(Bytes::from(format!("chunk{}", i)))).collect()),
            Duration::from_secs(5),
        );

        drop(body);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(health.status("p1").consecutive_failures, 0);
    }
}
