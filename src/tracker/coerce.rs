//! Type coercion applied when a written value does not already match the
//! field's expected type.

use serde_json::{Number, Value};

use crate::schema::FieldType;

/// Attempts to convert `value` into `expected`. `None` means the value
/// cannot be represented as that type.
///
/// Booleans follow the literal rule: a string is `true` only when it equals
/// `"true"` ignoring case, every other string is `false`. Lists are never
/// produced from a non-list.
pub fn coerce(value: &Value, expected: FieldType) -> Option<Value> {
    match expected {
        FieldType::Bool => Some(Value::Bool(truthy(value))),
        FieldType::Int => to_int(value).map(Value::from),
        FieldType::Float => to_float(value).and_then(Number::from_f64).map(Value::Number),
        FieldType::String => match value {
            Value::String(s) => Some(Value::String(s.trim().to_string())),
            Value::Number(n) => Some(Value::String(n.to_string().trim().to_string())),
            _ => None,
        },
        FieldType::List => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => s.to_lowercase() == "true",
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            // truncation toward zero, refusing values outside i64
            (f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64)
                .then(|| f.trunc() as i64)
        }),
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Empty string, empty list or empty object.
pub fn is_zero_length(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Reads a resource identifier from an integer or an integer string.
pub fn parse_identifier(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
