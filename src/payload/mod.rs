//! Payload shaping
//!
//! Everything between a raw upstream read and the JSON text handed to
//! connections:
//!
//! ```text
//!   upstream Value ──changed()?──► Envelope::wrap ──► OutboundPayload ──► WireMessage
//!                                  (or Raw(value) in no-wrap mode)       (shared Bytes)
//! ```

pub mod change;
pub mod envelope;
pub mod wire;

pub use change::changed;
pub use envelope::{Envelope, WrapperTemplate, LAST_UPDATE_TS_KEY, UPSTREAM_DATA_KEY};
pub use wire::{OutboundPayload, WireMessage};
