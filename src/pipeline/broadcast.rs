//! Broadcast worker
//!
//! Takes one payload at a time off the handoff queue, serializes it once, and
//! sends it to every registered connection. The delay after each cycle caps
//! the fan-out rate no matter how fast payloads arrive.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::panic_message;
use super::queue::QueueReceiver;
use crate::payload::OutboundPayload;
use crate::registry::{BroadcastOutcome, ConnectionRegistry};
use crate::stats::PipelineStats;

/// Worker writing to downstream connections
pub struct BroadcastWorker {
    queue: QueueReceiver,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<PipelineStats>,
    delay: Duration,
}

impl BroadcastWorker {
    /// Create a worker draining `queue` into `registry`
    pub fn new(
        queue: QueueReceiver,
        registry: Arc<ConnectionRegistry>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            queue,
            registry,
            stats,
            delay: crate::broadcaster::config::DEFAULT_DELAY,
        }
    }

    /// Set the delay between broadcast cycles
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait for one payload and broadcast it
    ///
    /// Returns `None` if the queue is closed and empty.
    pub async fn broadcast_once(&mut self) -> Option<BroadcastOutcome> {
        let payload = self.queue.pop().await?;
        Some(self.deliver(payload).await)
    }

    async fn deliver(&self, payload: OutboundPayload) -> BroadcastOutcome {
        let message = match payload.to_wire() {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize payload");
                return BroadcastOutcome::default();
            }
        };

        let outcome = self.registry.broadcast(&message).await;
        self.stats.record_broadcast(outcome.delivered, outcome.failed);
        outcome
    }

    /// Broadcast until `cancel` fires
    ///
    /// Waiting on the queue is the only place this worker suspends without a
    /// bound; each send is capped by the registry's send timeout. A panic
    /// while delivering is logged and the loop keeps going.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::debug!(delay = ?self.delay, "Broadcast worker started");

        loop {
            let payload = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                payload = self.queue.pop() => payload,
            };

            let Some(payload) = payload else {
                tracing::warn!("Handoff queue closed, waiting for shutdown");
                cancel.cancelled().await;
                break;
            };

            if let Err(panic) = AssertUnwindSafe(self.deliver(payload)).catch_unwind().await {
                self.stats.record_restart();
                tracing::error!(
                    panic = %panic_message(panic),
                    "Broadcast worker panicked, restarting loop"
                );
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        tracing::debug!("Broadcast worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::queue::{self, QueueSender};
    use crate::registry::ConnectionHandle;
    use crate::testing::{PanicOnce, RecordingConnection, StalledConnection};

    async fn setup(connections: &[RecordingConnection]) -> (BroadcastWorker, QueueSender) {
        let registry = Arc::new(ConnectionRegistry::default());
        for conn in connections {
            registry.add(conn.handle()).await;
        }
        let (tx, rx) = queue::channel(None);
        let worker = BroadcastWorker::new(rx, registry, Arc::new(PipelineStats::new()));
        (worker, tx)
    }

    #[tokio::test]
    async fn test_broadcast_once_sends_to_all() {
        let conns: Vec<_> = (0..3).map(|_| RecordingConnection::new()).collect();
        let (mut worker, tx) = setup(&conns).await;
        tx.push(OutboundPayload::Raw(json!("foo"))).unwrap();
        tx.push(OutboundPayload::Raw(json!("bar"))).unwrap();

        worker.broadcast_once().await;
        assert_eq!(worker.queue.len(), 1);
        worker.broadcast_once().await;
        assert_eq!(worker.queue.len(), 0);

        for conn in &conns {
            assert_eq!(conn.messages(), vec!["{}", r#"["foo"]"#, r#"["bar"]"#]);
        }
        assert_eq!(worker.stats.snapshot().sends, 6);
    }

    #[tokio::test]
    async fn test_send_failure_is_isolated() {
        let conns: Vec<_> = (0..3).map(|_| RecordingConnection::new()).collect();
        conns[1].fail_on(r#"["foo"]"#);
        let (mut worker, tx) = setup(&conns).await;
        tx.push(OutboundPayload::Raw(json!("foo"))).unwrap();
        tx.push(OutboundPayload::Raw(json!("bar"))).unwrap();

        let first = worker.broadcast_once().await.unwrap();
        assert_eq!(first, BroadcastOutcome { delivered: 2, failed: 1 });
        let second = worker.broadcast_once().await.unwrap();
        assert_eq!(second, BroadcastOutcome { delivered: 3, failed: 0 });

        assert_eq!(conns[0].messages(), vec!["{}", r#"["foo"]"#, r#"["bar"]"#]);
        assert_eq!(conns[1].messages(), vec!["{}", r#"["bar"]"#]);
        assert_eq!(conns[2].messages(), vec!["{}", r#"["foo"]"#, r#"["bar"]"#]);
    }

    #[tokio::test]
    async fn test_broadcast_once_on_closed_queue() {
        let (mut worker, tx) = setup(&[]).await;
        drop(tx);
        assert_eq!(worker.broadcast_once().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_throttles_and_stops() {
        let conn = RecordingConnection::new();
        let (worker, tx) = setup(std::slice::from_ref(&conn)).await;
        let worker = worker.delay(Duration::from_secs(1));
        for i in 0..3 {
            tx.push(OutboundPayload::Raw(json!(i))).unwrap();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(conn.messages(), vec!["{}", "[0]", "[1]"]);

        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(conn.send_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_connection_does_not_cost_others() {
        let conns: Vec<_> = (0..10).map(|_| RecordingConnection::new()).collect();
        let (worker, tx) = setup(&conns).await;
        let registry = Arc::clone(&worker.registry);
        let stats = Arc::clone(&worker.stats);

        let bomb = Arc::new(PanicOnce::default());
        registry.add(ConnectionHandle::from(Arc::clone(&bomb))).await;
        bomb.arm();

        tx.push(OutboundPayload::Raw(json!("first"))).unwrap();
        tx.push(OutboundPayload::Raw(json!("second"))).unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        task.await.unwrap();

        for conn in &conns {
            assert_eq!(conn.messages(), vec!["{}", r#"["first"]"#, r#"["second"]"#]);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.send_failures, 1);
        assert_eq!(snap.worker_restarts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_connection_does_not_block_later_payloads() {
        let good = RecordingConnection::new();
        let (tx, rx) = queue::channel(None);
        let registry = Arc::new(ConnectionRegistry::default().send_timeout(Duration::from_secs(2)));
        registry.add(good.handle()).await;
        let stalled = Arc::new(StalledConnection::default());
        registry.add(ConnectionHandle::from(Arc::clone(&stalled))).await;
        stalled.arm();

        let worker = BroadcastWorker::new(rx, registry, Arc::new(PipelineStats::new()));
        tx.push(OutboundPayload::Raw(json!("foo"))).unwrap();
        tx.push(OutboundPayload::Raw(json!("bar"))).unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(good.messages(), vec!["{}", r#"["foo"]"#, r#"["bar"]"#]);
    }
}
