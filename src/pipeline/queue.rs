//! Handoff queue between the poll and broadcast workers
//!
//! Push never blocks; pop waits until a payload is available. A bounded queue
//! that is full rejects the push and hands the payload back.

use tokio::sync::mpsc;

use crate::payload::OutboundPayload;

/// Why a push was rejected
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Bounded queue is at capacity
    #[error("handoff queue is full")]
    Full(OutboundPayload),
    /// The receiving side is gone
    #[error("handoff queue is closed")]
    Closed(OutboundPayload),
}

enum Tx {
    Bounded(mpsc::Sender<OutboundPayload>),
    Unbounded(mpsc::UnboundedSender<OutboundPayload>),
}

enum Rx {
    Bounded(mpsc::Receiver<OutboundPayload>),
    Unbounded(mpsc::UnboundedReceiver<OutboundPayload>),
}

/// Producer side, owned by the poll worker
pub struct QueueSender {
    tx: Tx,
}

/// Consumer side, owned by the broadcast worker
pub struct QueueReceiver {
    rx: Rx,
}

/// Create a queue, bounded if `capacity` is given
pub fn channel(capacity: Option<usize>) -> (QueueSender, QueueReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (
                QueueSender { tx: Tx::Bounded(tx) },
                QueueReceiver { rx: Rx::Bounded(rx) },
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                QueueSender {
                    tx: Tx::Unbounded(tx),
                },
                QueueReceiver {
                    rx: Rx::Unbounded(rx),
                },
            )
        }
    }
}

impl QueueSender {
    /// Enqueue without waiting
    pub fn push(&self, payload: OutboundPayload) -> Result<(), PushError> {
        match &self.tx {
            Tx::Bounded(tx) => tx.try_send(payload).map_err(|e| match e {
                mpsc::error::TrySendError::Full(p) => PushError::Full(p),
                mpsc::error::TrySendError::Closed(p) => PushError::Closed(p),
            }),
            Tx::Unbounded(tx) => tx.send(payload).map_err(|e| PushError::Closed(e.0)),
        }
    }
}

impl QueueReceiver {
    /// Wait for the next payload
    ///
    /// Returns `None` once the sender is dropped and the queue is drained.
    pub async fn pop(&mut self) -> Option<OutboundPayload> {
        match &mut self.rx {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take the next payload if one is ready
    pub fn try_pop(&mut self) -> Option<OutboundPayload> {
        match &mut self.rx {
            Rx::Bounded(rx) => rx.try_recv().ok(),
            Rx::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Number of queued payloads
    pub fn len(&self) -> usize {
        match &self.rx {
            Rx::Bounded(rx) => rx.len(),
            Rx::Unbounded(rx) => rx.len(),
        }
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
