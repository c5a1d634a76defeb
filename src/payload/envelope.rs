//! Envelope wrapping
//!
//! Upstream data is wrapped together with a user-configured template and the
//! wall-clock time of the wrap before it is sent downstream:
//!
//! ```text
//! { ..template keys.., "upstream_data": <value>, "last_update_ts": <unix secs> }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Key carrying the upstream snapshot
pub const UPSTREAM_DATA_KEY: &str = "upstream_data";

/// Key carrying the wrap timestamp
pub const LAST_UPDATE_TS_KEY: &str = "last_update_ts";

/// Static key/value mapping merged into every envelope
pub type WrapperTemplate = Map<String, Value>;

/// Wrapped upstream payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Template fields, never containing the reserved keys
    #[serde(flatten)]
    template: WrapperTemplate,

    /// Snapshot of the upstream value at wrap time
    pub upstream_data: Value,

    /// Unix timestamp (seconds) of the wrap
    pub last_update_ts: i64,
}

impl Envelope {
    /// Wrap a value using the current wall-clock time
    pub fn wrap(template: &WrapperTemplate, raw: &Value) -> Self {
        Self::wrap_at(template, raw, chrono::Utc::now().timestamp())
    }

    /// Wrap a value with an explicit timestamp
    ///
    /// `raw` is cloned, so later changes to the caller's value never reach an
    /// envelope that is already queued. Template entries named like the
    /// reserved keys are dropped.
    pub fn wrap_at(template: &WrapperTemplate, raw: &Value, last_update_ts: i64) -> Self {
        let mut template = template.clone();
        template.remove(UPSTREAM_DATA_KEY);
        template.remove(LAST_UPDATE_TS_KEY);

        Self {
            template,
            upstream_data: raw.clone(),
            last_update_ts,
        }
    }

    /// Template fields carried by this envelope
    pub fn template(&self) -> &WrapperTemplate {
        &self.template
    }
}
