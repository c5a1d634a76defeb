//! Connection registry implementation
//!
//! The set of downstream connections, mutated by the accept layer and read by
//! the broadcast worker at the same time.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::RwLock;

use super::handle::ConnectionHandle;
use super::state::LastKnownState;
use crate::error::SendError;
use crate::payload::WireMessage;
use crate::pipeline::panic_message;

/// Default limit on a single send before it counts as failed
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Point-in-time copy of the registered connections
pub type ConnectionSnapshot = Arc<HashSet<ConnectionHandle>>;

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Connections that accepted the message
    pub delivered: usize,
    /// Connections whose send failed, timed out or panicked
    pub failed: usize,
}

/// Registry of downstream connections
///
/// Copy-on-write: the live set sits behind an `Arc`, a snapshot is a clone of
/// that `Arc`, and mutation clones the set only while a snapshot is alive.
/// Iterating a snapshot is never affected by concurrent `add`/`remove`.
///
/// Every send is bounded by `send_timeout`, so a hung connection costs one
/// timeout per message and nothing more.
pub struct ConnectionRegistry {
    connections: RwLock<ConnectionSnapshot>,
    last_known: Arc<LastKnownState>,
    send_timeout: Duration,
}

impl ConnectionRegistry {
    /// Create an empty registry that greets joiners with `last_known`
    pub fn new(last_known: Arc<LastKnownState>) -> Self {
        Self {
            connections: RwLock::new(Arc::new(HashSet::new())),
            last_known,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Set the per-send time limit
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// State sent to joining connections
    pub fn last_known(&self) -> &Arc<LastKnownState> {
        &self.last_known
    }

    /// Register a connection
    ///
    /// Returns `false` if it was already registered, in which case nothing is
    /// sent. On insert the last known state is sent to the new connection
    /// right away; a failure there is logged and the connection stays
    /// registered.
    pub async fn add(&self, handle: ConnectionHandle) -> bool {
        let count = {
            let mut connections = self.connections.write().await;
            if connections.contains(&handle) {
                tracing::debug!(connection = ?handle, "Connection already registered");
                return false;
            }
            Arc::make_mut(&mut *connections).insert(handle.clone());
            connections.len()
        };

        tracing::info!(connection = ?handle, connections = count, "Connection added");

        match self.last_known.to_wire() {
            Ok(message) => {
                if let Err(e) = self.guarded_send(&handle, message).await {
                    tracing::warn!(
                        connection = ?handle,
                        error = %e,
                        "Failed to send last known state"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize last known state");
            }
        }

        true
    }

    /// Unregister a connection
    ///
    /// Returns the removed handle, or `None` if it was not registered.
    pub async fn remove(&self, handle: &ConnectionHandle) -> Option<ConnectionHandle> {
        let mut connections = self.connections.write().await;
        if !connections.contains(handle) {
            return None;
        }

        let removed = Arc::make_mut(&mut *connections).take(handle);
        tracing::info!(
            connection = ?handle,
            connections = connections.len(),
            "Connection removed"
        );
        removed
    }

    /// Copy of the current membership, safe to iterate while it changes
    pub async fn snapshot(&self) -> ConnectionSnapshot {
        Arc::clone(&*self.connections.read().await)
    }

    /// Check whether a connection is registered
    pub async fn contains(&self, handle: &ConnectionHandle) -> bool {
        self.connections.read().await.contains(handle)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connections are registered
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Send a message to every registered connection
    ///
    /// Sends run concurrently against a snapshot. A send that fails, panics
    /// or outlives `send_timeout` is logged and counted as failed. The
    /// connection is not removed: only the accept layer knows whether it is
    /// really gone.
    pub async fn broadcast(&self, message: &WireMessage) -> BroadcastOutcome {
        let snapshot = self.snapshot().await;

        let results = join_all(snapshot.iter().map(|handle| {
            let message = message.clone();
            async move { (handle, self.guarded_send(handle, message).await) }
        }))
        .await;

        let mut outcome = BroadcastOutcome::default();
        for (handle, result) in results {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(connection = ?handle, error = %e, "Send failed");
                }
            }
        }

        tracing::debug!(
            delivered = outcome.delivered,
            failed = outcome.failed,
            bytes = message.len(),
            "Broadcast complete"
        );

        outcome
    }

    /// Send to one connection, turning a panic or timeout into a `SendError`
    async fn guarded_send(
        &self,
        handle: &ConnectionHandle,
        message: WireMessage,
    ) -> Result<(), SendError> {
        let send = AssertUnwindSafe(handle.send(message)).catch_unwind();
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(SendError::Panicked(panic_message(panic))),
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(Arc::new(LastKnownState::new()))
    }
}
