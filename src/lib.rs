//! pressure-rs: poll one upstream source, broadcast its changes downstream
//!
//! A [`Pressure`] instance runs two tokio tasks joined by a handoff queue:
//!
//! ```text
//!   Upstream ─► PollWorker ─► queue ─► BroadcastWorker ─► ConnectionRegistry ─► send(text)
//!   (read)      (diff/wrap)            (serialize once)    (snapshot fan-out)
//! ```
//!
//! - The poll worker reads the source every `read_worker_delay`, skips reads
//!   equal to the previous one, and queues one payload per change.
//! - The broadcast worker pops one payload at a time, serializes it to JSON
//!   and sends it to every registered connection, then waits
//!   `broadcast_worker_delay`.
//! - Connections joining the registry immediately receive the last known
//!   envelope (or `{}` before any data has arrived).
//!
//! # Wire format
//!
//! Wrapped (default):
//!
//! ```text
//! {"someKey":"Some Value","upstream_data":<value>,"last_update_ts":1700000000}
//! ```
//!
//! With `no_wrap`, the raw value in a single-element array: `[<value>]`.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use pressure::{pipeline, ConnectionHandle, Downstream, Pressure, PressureConfig, SendError, WireMessage};
//! use serde_json::json;
//!
//! struct Stdout;
//!
//! #[async_trait]
//! impl Downstream for Stdout {
//!     async fn send(&self, message: WireMessage) -> Result<(), SendError> {
//!         println!("{}", message);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() {
//! let pressure = Pressure::new(
//!     PressureConfig::default(),
//!     pipeline::from_fn(|| Ok::<_, std::io::Error>(json!({"status": "ok"}))),
//! );
//! pressure.add(ConnectionHandle::new(Stdout)).await;
//! # pressure.stop().await;
//! # }
//! ```

pub mod broadcaster;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod registry;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcaster::{PipelineState, Pressure, PressureConfig};
pub use error::{Error, Result, SendError, UpstreamError};
pub use payload::{Envelope, OutboundPayload, WireMessage, WrapperTemplate};
pub use pipeline::Upstream;
pub use registry::{ConnectionHandle, ConnectionRegistry, Downstream};
pub use stats::StatsSnapshot;
