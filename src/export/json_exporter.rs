use serde_json::Value;

use crate::error::BurpResult;

/// Pretty-print whatever was passed, two-space indented.
///
/// Unlike the tabular formats this serialises the full value, so a result
/// object keeps its summary and metadata next to the records.
pub fn to_json(data: &Value) -> BurpResult<String> {
    Ok(serde_json::to_string_pretty(data)?)
}
