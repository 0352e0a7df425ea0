//! Device payload parsing
//!
//! Devices send one JSON value per message: either a bare number or an
//! envelope object carrying the number under `value`.

use serde_json::Value;

/// Envelope key carrying the sample value
pub const VALUE_KEY: &str = "value";

/// Parsed form of one device message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Bare JSON number, e.g. `512.25`
    Number(f64),
    /// Envelope object, e.g. `{"value": 512.25}`
    Enveloped(f64),
    /// Anything else; forwarded to viewers but never recorded
    Unrecognized,
}

impl Sample {
    /// Parse a raw text payload
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Sample::Unrecognized,
        }
    }

    /// Classify an already-decoded JSON value
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => finite(n.as_f64()).map_or(Sample::Unrecognized, Sample::Number),
            Value::Object(map) => match map.get(VALUE_KEY) {
                Some(Value::Number(n)) => {
                    finite(n.as_f64()).map_or(Sample::Unrecognized, Sample::Enveloped)
                }
                Some(Value::String(s)) => {
                    finite(s.trim().parse().ok()).map_or(Sample::Unrecognized, Sample::Enveloped)
                }
                _ => Sample::Unrecognized,
            },
            _ => Sample::Unrecognized,
        }
    }

    /// Numeric value, if the payload carried one
    pub fn value(&self) -> Option<f64> {
        match *self {
            Sample::Number(v) | Sample::Enveloped(v) => Some(v),
            Sample::Unrecognized => None,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
