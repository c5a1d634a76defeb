//! Change detection between successive upstream reads

use serde_json::Value;

/// Check whether an upstream value differs from the previous read.
///
/// A missing, `null` or `false` value on either side always counts as a
/// change, so the first poll is always forwarded. Otherwise the comparison is
/// exact structural equality.
pub fn changed(previous: Option<&Value>, current: Option<&Value>) -> bool {
    match (previous, current) {
        (Some(prev), Some(cur)) if is_present(prev) && is_present(cur) => prev != cur,
        _ => true,
    }
}

fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}
