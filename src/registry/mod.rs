//! Connection registry
//!
//! Tracks the downstream connections and fans serialized payloads out to
//! them. Joining connections are greeted with the last known state so they
//! never start from a blank slate.
//!
//! # Architecture
//!
//! ```text
//!        accept layer                          BroadcastWorker
//!   add(handle) / remove(&handle)           broadcast(&WireMessage)
//!              │                                      │
//!              ▼                                      ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │ ConnectionRegistry                                      │
//!   │   connections: RwLock<Arc<HashSet<ConnectionHandle>>>   │
//!   │   last_known:  Arc<LastKnownState>  (ArcSwapOption)     │
//!   └─────────────────────────────────────────────────────────┘
//!              │ on add                               │ per snapshot member
//!              ▼                                      ▼
//!       send(last known)                        send(message)
//! ```
//!
//! # Zero-Copy Design
//!
//! A [`WireMessage`](crate::payload::WireMessage) wraps `bytes::Bytes`, so the
//! JSON text of a broadcast is serialized once and shared by every
//! connection.

pub mod handle;
pub mod state;
pub mod store;

pub use handle::{ConnectionHandle, Downstream};
pub use state::LastKnownState;
pub use store::{BroadcastOutcome, ConnectionRegistry, ConnectionSnapshot, DEFAULT_SEND_TIMEOUT};
