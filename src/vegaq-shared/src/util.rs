//! Small JSON helpers shared by transform parsing

use serde_json::Value as JsonValue;

/// Promote a scalar-or-list JSON value to a list.
///
/// Vega allows most list-valued transform parameters (`sort.field`,
/// `sort.order`, ...) to be written as bare scalars.
pub fn promote_list(value: &JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}
