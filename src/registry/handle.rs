//! Downstream connection handles
//!
//! The registry only ever calls `send` on a connection. Opening, closing and
//! reading from it belong to whatever accepted it (typically a websocket
//! handler).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SendError;
use crate::payload::WireMessage;

/// Anything that can receive broadcast text
#[async_trait]
pub trait Downstream: Send + Sync + 'static {
    /// Deliver one serialized payload
    async fn send(&self, message: WireMessage) -> Result<(), SendError>;
}

/// Shared handle to a downstream connection
///
/// Equality and hashing use the identity of the underlying allocation, so two
/// clones of one handle are the same member of the registry while two
/// distinct connections never collide, even if they compare equal by value.
#[derive(Clone)]
pub struct ConnectionHandle(Arc<dyn Downstream>);

impl ConnectionHandle {
    /// Wrap a connection
    pub fn new<D: Downstream>(downstream: D) -> Self {
        Self(Arc::new(downstream))
    }

    /// Wrap an already shared connection
    pub fn from_arc(downstream: Arc<dyn Downstream>) -> Self {
        Self(downstream)
    }

    /// Send a message to this connection
    pub async fn send(&self, message: WireMessage) -> Result<(), SendError> {
        self.0.send(message).await
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<D: Downstream> From<Arc<D>> for ConnectionHandle {
    fn from(downstream: Arc<D>) -> Self {
        Self(downstream)
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConnectionHandle").field(&self.addr()).finish()
    }
}
