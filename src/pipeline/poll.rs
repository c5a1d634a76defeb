//! Poll worker
//!
//! Reads the upstream source on a fixed delay, drops unchanged reads, and
//! queues one payload per detected change.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::panic_message;
use super::queue::{PushError, QueueSender};
use super::upstream::Upstream;
use crate::payload::{changed, Envelope, OutboundPayload, WrapperTemplate};
use crate::registry::LastKnownState;
use crate::stats::PipelineStats;

/// What one poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Value changed and a payload was queued
    Queued,
    /// Value changed but the queue rejected the payload
    Dropped,
    /// Value was the same as the previous read
    Unchanged,
    /// The upstream read failed
    Failed,
}

/// Worker reading from upstream
pub struct PollWorker {
    upstream: Arc<dyn Upstream>,
    queue: QueueSender,
    last_known: Arc<LastKnownState>,
    template: Arc<ArcSwap<WrapperTemplate>>,
    stats: Arc<PipelineStats>,
    no_wrap: bool,
    delay: Duration,
    last_seen: Option<Value>,
}

impl PollWorker {
    /// Create a worker feeding `queue`
    pub fn new(
        upstream: Arc<dyn Upstream>,
        queue: QueueSender,
        last_known: Arc<LastKnownState>,
        template: Arc<ArcSwap<WrapperTemplate>>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            upstream,
            queue,
            last_known,
            template,
            stats,
            no_wrap: false,
            delay: crate::broadcaster::config::DEFAULT_DELAY,
            last_seen: None,
        }
    }

    /// Queue raw values instead of envelopes
    pub fn no_wrap(mut self, no_wrap: bool) -> Self {
        self.no_wrap = no_wrap;
        self
    }

    /// Set the delay between polls
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run a single poll cycle without sleeping
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.stats.record_poll();

        let raw = match self.upstream.read().await {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.record_upstream_error();
                tracing::error!(error = %e, "Upstream read failed");
                return PollOutcome::Failed;
            }
        };

        if !changed(self.last_seen.as_ref(), Some(&raw)) {
            return PollOutcome::Unchanged;
        }

        let envelope = Envelope::wrap(&self.template.load(), &raw);
        self.last_known.store(envelope.clone());

        let payload = if self.no_wrap {
            OutboundPayload::Raw(raw.clone())
        } else {
            OutboundPayload::Wrapped(envelope)
        };

        // `last_seen` only advances once the payload is queued, so a value
        // rejected by a full queue is offered again on the next poll.
        match self.queue.push(payload) {
            Ok(()) => {
                self.last_seen = Some(raw);
                self.stats.record_change();
                tracing::debug!(no_wrap = self.no_wrap, "Upstream changed, payload queued");
                PollOutcome::Queued
            }
            Err(e @ PushError::Full(_)) => {
                self.stats.record_dropped();
                tracing::warn!(error = %e, "Queue full, will retry on next poll");
                PollOutcome::Dropped
            }
            Err(e @ PushError::Closed(_)) => {
                tracing::debug!(error = %e, "Dropping payload");
                PollOutcome::Dropped
            }
        }
    }

    /// Poll until `cancel` fires
    ///
    /// A panic inside a cycle is logged and the loop carries on with the next
    /// cycle. Cancellation is observed between cycles and during the sleep.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::debug!(delay = ?self.delay, "Poll worker started");

        while !cancel.is_cancelled() {
            if let Err(panic) = AssertUnwindSafe(self.poll_once()).catch_unwind().await {
                self.stats.record_restart();
                tracing::error!(panic = %panic_message(panic), "Poll worker panicked, restarting loop");
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        tracing::debug!("Poll worker stopped");
    }
}
