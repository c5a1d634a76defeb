//! Error types
//!
//! Nothing in the pipeline propagates these to callers of `add`/`remove` or
//! to the queue: workers log them and move on. They exist so that upstream
//! sources and downstream connections have a typed way to report failure.

use std::error::Error as StdError;
use std::time::Duration;

/// Result alias for fallible crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by a user-supplied source
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be parsed or is invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A payload could not be serialized to JSON
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure reported by the upstream source during a poll
#[derive(Debug, thiserror::Error)]
#[error("upstream read failed: {source}")]
pub struct UpstreamError {
    #[source]
    source: BoxError,
}

impl UpstreamError {
    /// Wrap any error produced by the source
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Failure delivering a message to one downstream connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The connection is closed
    #[error("connection closed")]
    Closed,

    /// Transport-level failure
    #[error("i/o error: {0}")]
    Io(String),

    /// The send did not complete within the registry's send timeout
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    /// The connection's `send` panicked
    #[error("send panicked: {0}")]
    Panicked(String),

    /// Anything else the connection wants to report
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for SendError {
    fn from(err: std::io::Error) -> Self {
        SendError::Io(err.to_string())
    }
}
