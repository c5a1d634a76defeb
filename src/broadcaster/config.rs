//! Broadcaster configuration

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::payload::WrapperTemplate;
use crate::registry::DEFAULT_SEND_TIMEOUT;

/// Default delay between worker loop iterations (1/20 s)
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Default time `stop()` waits for a worker before aborting it
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Broadcaster configuration options
///
/// Deserializable from JSON, with delays given as float seconds and the
/// legacy option names accepted as aliases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Send the raw upstream value as `[value]` instead of an envelope
    pub no_wrap: bool,

    /// Delay between upstream polls
    #[serde(
        alias = "poll_interval",
        alias = "incoming_monitor_delay",
        deserialize_with = "seconds"
    )]
    pub read_worker_delay: Duration,

    /// Delay between broadcast cycles
    #[serde(alias = "websocket_worker_delay", deserialize_with = "seconds")]
    pub broadcast_worker_delay: Duration,

    /// Start the workers when the broadcaster is constructed
    pub start: bool,

    /// Fields merged into every envelope
    pub wrapper_template: WrapperTemplate,

    /// Handoff queue capacity (None = unbounded)
    pub queue_capacity: Option<usize>,

    /// How long `stop()` waits for each worker before aborting it
    #[serde(deserialize_with = "seconds")]
    pub stop_grace_period: Duration,

    /// Longest a single connection's send may take before it counts as failed
    #[serde(deserialize_with = "seconds")]
    pub send_timeout: Duration,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            no_wrap: false,
            read_worker_delay: DEFAULT_DELAY,
            broadcast_worker_delay: DEFAULT_DELAY,
            start: true,
            wrapper_template: WrapperTemplate::new(),
            queue_capacity: None,
            stop_grace_period: DEFAULT_STOP_GRACE_PERIOD,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

impl PressureConfig {
    /// Parse a configuration from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialization alone does not rule out
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == Some(0) {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.send_timeout.is_zero() {
            return Err(Error::Config("send_timeout must be positive".into()));
        }
        Ok(())
    }

    /// Send raw values instead of envelopes
    pub fn no_wrap(mut self, no_wrap: bool) -> Self {
        self.no_wrap = no_wrap;
        self
    }

    /// Set the delay between upstream polls
    pub fn read_worker_delay(mut self, delay: Duration) -> Self {
        self.read_worker_delay = delay;
        self
    }

    /// Set the delay between broadcast cycles
    pub fn broadcast_worker_delay(mut self, delay: Duration) -> Self {
        self.broadcast_worker_delay = delay;
        self
    }

    /// Don't start the workers on construction
    pub fn manual_start(mut self) -> Self {
        self.start = false;
        self
    }

    /// Set the envelope template
    pub fn wrapper_template(mut self, template: WrapperTemplate) -> Self {
        self.wrapper_template = template;
        self
    }

    /// Add a single template field
    pub fn template_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.wrapper_template.insert(key.into(), value.into());
        self
    }

    /// Bound the handoff queue (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity.max(1));
        self
    }

    /// Set the stop grace period
    pub fn stop_grace_period(mut self, grace: Duration) -> Self {
        self.stop_grace_period = grace;
        self
    }

    /// Set the per-connection send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        serde::de::Error::custom(format!(
            "expected a non-negative number of seconds, got {secs}"
        ))
    })
}
