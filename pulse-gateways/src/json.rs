use pulse_core::gateways::open_data::Row;
use serde_json::{Map, Value};

/// Turns a JSON record into text cells. Nulls are dropped,
/// nested values are kept as JSON.
pub fn flatten(record: Map<String, Value>) -> Row {
    record
        .into_iter()
        .filter_map(|(key, value)| {
            let cell = match value {
                Value::Null => return None,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
            };
            Some((key, cell))
        })
        .collect()
}
