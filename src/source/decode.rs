//! JSON line decoder
//!
//! Each line of the stats log is one flat JSON object.

use std::str::{self, Utf8Error};
use thiserror::Error;

use crate::telemetry::{Record, Value};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),

    #[error("malformed JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("field '{field}' has unsupported {found} value")]
    UnsupportedValue { field: String, found: &'static str },

    #[error("field '{field}' does not fit a signed 64-bit integer")]
    IntegerOutOfRange { field: String },
}

/// Decode one log line into a record
pub fn decode_line(line: impl AsRef<[u8]>) -> Result<Record, DecodeError> {
    let text = str::from_utf8(line.as_ref())?;
    let parsed: serde_json::Value = serde_json::from_str(text)?;

    let map = match parsed {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(DecodeError::NotAnObject {
                found: json_kind(&other),
            })
        }
    };

    map.into_iter()
        .map(|(field, value)| convert(&field, value).map(|v| (field, v)))
        .collect()
}

fn convert(field: &str, value: serde_json::Value) -> Result<Value, DecodeError> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if n.is_u64() {
                Err(DecodeError::IntegerOutOfRange {
                    field: field.to_string(),
                })
            } else {
                n.as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| DecodeError::UnsupportedValue {
                        field: field.to_string(),
                        found: "number",
                    })
            }
        }
        serde_json::Value::String(s) => Ok(Value::Str(s)),
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        other => Err(DecodeError::UnsupportedValue {
            field: field.to_string(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_driver_line() {
        let line = r#"{"__tag":"exanic_stats","ts":1500000000123456789,"delay":0.5,"nic_sw_rx_packets_rx":42,"up":true}"#;
        let r = decode_line(line).unwrap();
        assert_eq!(r.len(), 5);
        assert_eq!(r.get("__tag"), Some(&Value::from("exanic_stats")));
        assert_eq!(r.get_int("ts"), Some(1_500_000_000_123_456_789));
        assert_eq!(r.get("delay"), Some(&Value::Float(0.5)));
        assert_eq!(r.get_int("nic_sw_rx_packets_rx"), Some(42));
        assert_eq!(r.get("up"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_negative_integers_stay_integers() {
        let r = decode_line(r#"{"x":-5}"#).unwrap();
        assert_eq!(r.get_int("x"), Some(-5));
    }

    #[test]
    fn test_float_with_integral_value_is_not_a_counter() {
        let r = decode_line(r#"{"x":2.0}"#).unwrap();
        assert_eq!(r.get_int("x"), None);
    }

    #[test]
    fn test_malformed_line() {
        assert!(matches!(
            decode_line(r#"{"ts": 12"#),
            Err(DecodeError::Syntax(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let line: &[u8] = b"{\"__tag\":\"exa\xffnic\",\"ts\":1}";
        assert!(matches!(decode_line(line), Err(DecodeError::InvalidUtf8(_))));
    }

    #[test]
    fn test_top_level_must_be_object() {
        match decode_line("[1,2,3]") {
            Err(DecodeError::NotAnObject { found }) => assert_eq!(found, "array"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_values_rejected() {
        match decode_line(r#"{"ts":1,"ports":[0,1]}"#) {
            Err(DecodeError::UnsupportedValue { field, found }) => {
                assert_eq!(field, "ports");
                assert_eq!(found, "array");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(decode_line(r#"{"ts":null}"#).is_err());
    }

    #[test]
    fn test_u64_above_i64_rejected() {
        match decode_line(r#"{"ts":18446744073709551615}"#) {
            Err(DecodeError::IntegerOutOfRange { field }) => assert_eq!(field, "ts"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
