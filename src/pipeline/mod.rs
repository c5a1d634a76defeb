//! Two-worker broadcast pipeline
//!
//! ```text
//!   Upstream::read ──► PollWorker ──push──► handoff queue ──pop──► BroadcastWorker
//!                        │                                           │
//!                        └─► LastKnownState                          └─► ConnectionRegistry::broadcast
//! ```
//!
//! The queue is the only link between the two workers. Each worker runs until
//! its `CancellationToken` fires and survives panics inside a single cycle.

pub mod broadcast;
pub mod poll;
pub mod queue;
pub mod upstream;

pub use broadcast::BroadcastWorker;
pub use poll::{PollOutcome, PollWorker};
pub use queue::{PushError, QueueReceiver, QueueSender};
pub use upstream::{from_fn, FnUpstream, Upstream};

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
