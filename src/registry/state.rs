//! Last known state for late joiners

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::Result;
use crate::payload::{Envelope, WireMessage};

/// Most recently wrapped envelope
///
/// Written by the poll worker, read by the registry when a connection joins.
/// Readers always see a complete envelope: the value is swapped atomically,
/// never mutated in place.
#[derive(Debug, Default)]
pub struct LastKnownState {
    current: ArcSwapOption<Envelope>,
}

impl LastKnownState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current envelope
    pub fn store(&self, envelope: Envelope) {
        self.current.store(Some(Arc::new(envelope)));
    }

    /// Current envelope, if any data has arrived
    pub fn load(&self) -> Option<Arc<Envelope>> {
        self.current.load_full()
    }

    /// Serialized form sent to a joining connection
    ///
    /// `{}` until the first envelope is stored.
    pub fn to_wire(&self) -> Result<WireMessage> {
        match self.load() {
            Some(envelope) => WireMessage::encode(envelope.as_ref()),
            None => Ok(WireMessage::empty_object()),
        }
    }
}
