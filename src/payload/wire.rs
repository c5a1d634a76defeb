//! Outbound payloads and their wire form

use bytes::Bytes;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::envelope::Envelope;
use crate::error::Result;

/// One payload queued per detected change
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    /// Wrapped payload, sent as a JSON object
    Wrapped(Envelope),
    /// Raw upstream value, sent as a single-element JSON array
    Raw(Value),
}

impl OutboundPayload {
    /// Serialize to the JSON text sent to every connection
    pub fn to_wire(&self) -> Result<WireMessage> {
        WireMessage::encode(self)
    }
}

impl Serialize for OutboundPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OutboundPayload::Wrapped(envelope) => envelope.serialize(serializer),
            OutboundPayload::Raw(value) => [value].serialize(serializer),
        }
    }
}

/// Serialized JSON text shared by every connection in a broadcast cycle
///
/// Cloning only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireMessage(Bytes);

impl WireMessage {
    /// Serialize any value to JSON
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Message for a connection joining before any data has arrived
    pub fn empty_object() -> Self {
        Self(Bytes::from_static(b"{}"))
    }

    /// Text of the message
    pub fn as_str(&self) -> &str {
        // Only ever constructed from serde_json output, which is UTF-8
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Raw bytes of the message
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the message is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for WireMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for WireMessage {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
