//! Conversions from JSON message fields into [`Cell`] values.

mod cell;
mod timestamp;

pub use cell::Cell;
pub use timestamp::{epoch_to_timestamp, parse_iso_timestamp};

use serde_json::Value;

/// Converts a JSON value into the [`Cell`] bound for it.
///
/// Scalars keep their type, arrays and objects are bound as JSON.
pub fn value_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(value) => Cell::Bool(*value),
        Value::Number(number) => match number.as_i64() {
            Some(value) => Cell::I64(value),
            None => match number.as_f64() {
                Some(value) => Cell::F64(value),
                None => Cell::String(number.to_string()),
            },
        },
        Value::String(value) => Cell::String(value.clone()),
        Value::Array(_) | Value::Object(_) => Cell::Json(value.clone()),
    }
}
