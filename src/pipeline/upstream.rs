//! Upstream data sources

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BoxError, UpstreamError};

/// The single source polled by the poll worker
///
/// Called once per poll cycle. No timeout is applied: a read that blocks
/// stalls the poll cycle until it returns.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Read the current value
    async fn read(&self) -> Result<Value, UpstreamError>;
}

/// Upstream backed by a synchronous closure
pub struct FnUpstream<F> {
    f: F,
}

/// Use a closure as the upstream source
///
/// ```
/// use pressure::pipeline::upstream::{self, Upstream};
/// use serde_json::json;
///
/// # async fn example() {
/// let source = upstream::from_fn(|| Ok::<_, std::io::Error>(json!({"price": 10})));
/// assert_eq!(source.read().await.unwrap(), json!({"price": 10}));
/// # }
/// ```
pub fn from_fn<F, E>(f: F) -> FnUpstream<F>
where
    F: Fn() -> Result<Value, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    FnUpstream { f }
}

#[async_trait]
impl<F, E> Upstream for FnUpstream<F>
where
    F: Fn() -> Result<Value, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    async fn read(&self) -> Result<Value, UpstreamError> {
        (self.f)().map_err(|e| UpstreamError::new(e))
    }
}
