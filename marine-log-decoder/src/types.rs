//! Core types for the marine log decoder library
//!
//! This module defines the error type shared by every decoding stage and the
//! value type that decoded fields and assembled records are expressed in.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Wall-clock timestamp type used where device time can be anchored
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(String),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(String),

    #[error("Converter already registered for PGN {0}")]
    DuplicatePgn(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse state file: {0}")]
    StateParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DecoderError {
    /// True for errors that must stop processing before any stream is read
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DecoderError::DuplicatePgn(_) | DecoderError::InvalidConfig(_)
        )
    }
}

/// A single decoded field value
///
/// `Missing` marks a field with no data in the current record; decoders use
/// `Float(NaN)` for the "not available" sentinel so numeric columns stay numeric.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value was received for this field
    #[default]
    Missing,
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Boolean flag
    Boolean(bool),
    /// Free text, or a formatted compound value
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Missing => Ok(()),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            FieldValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Missing => serializer.serialize_none(),
            FieldValue::Integer(v) => serializer.serialize_i64(*v),
            FieldValue::Float(v) if v.is_nan() => serializer.serialize_none(),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Boolean(v) => serializer.serialize_bool(*v),
            FieldValue::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl FieldValue {
    /// Convert to f64; anything non-numeric becomes NaN
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Integer(v) => *v as f64,
            FieldValue::Float(v) => *v,
            FieldValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            FieldValue::Missing | FieldValue::Text(_) => f64::NAN,
        }
    }

    /// Convert to i64 if the value is numeric and available
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Float(v) if v.is_finite() => Some(*v as i64),
            FieldValue::Boolean(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    /// True when the field carries no usable value
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Convert a MessagePack value into a field value
    ///
    /// Arrays, maps and binary blobs are kept as their textual rendering.
    pub fn from_msgpack(value: &rmpv::Value) -> Self {
        use rmpv::Value;
        match value {
            Value::Nil => FieldValue::Missing,
            Value::Boolean(b) => FieldValue::Boolean(*b),
            Value::Integer(n) => match n.as_i64() {
                Some(v) => FieldValue::Integer(v),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::F32(v) => FieldValue::Float(f64::from(*v)),
            Value::F64(v) => FieldValue::Float(*v),
            Value::String(s) => FieldValue::Text(String::from_utf8_lossy(s.as_bytes()).into_owned()),
            other => FieldValue::Text(format_data(other)),
        }
    }
}

impl From<Option<u8>> for FieldValue {
    fn from(v: Option<u8>) -> Self {
        v.map_or(FieldValue::Missing, |v| FieldValue::Integer(i64::from(v)))
    }
}

impl From<Option<u16>> for FieldValue {
    fn from(v: Option<u16>) -> Self {
        v.map_or(FieldValue::Missing, |v| FieldValue::Integer(i64::from(v)))
    }
}

impl From<Option<u32>> for FieldValue {
    fn from(v: Option<u32>) -> Self {
        v.map_or(FieldValue::Missing, |v| FieldValue::Integer(i64::from(v)))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

/// Render MessagePack data for display
///
/// Strings are printed bare at the top level and quoted inside containers,
/// binary payloads as hex.
pub fn format_data(value: &rmpv::Value) -> String {
    use rmpv::Value;
    match value {
        Value::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        Value::Binary(b) => b.iter().map(|x| format!("{:02x}", x)).collect(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_nested).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(pairs) => {
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}: {}", format_nested(k), format_nested(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Value::Nil => "None".to_string(),
        other => other.to_string(),
    }
}

fn format_nested(value: &rmpv::Value) -> String {
    match value {
        rmpv::Value::String(s) => format!("'{}'", String::from_utf8_lossy(s.as_bytes())),
        other => format_data(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;

    #[test]
    fn test_field_value_conversions() {
        let int_val = FieldValue::Integer(42);
        assert_eq!(int_val.as_f64(), 42.0);
        assert_eq!(int_val.as_i64(), Some(42));

        let float_val = FieldValue::Float(3.75);
        assert_eq!(float_val.as_i64(), Some(3));

        assert!(FieldValue::Missing.as_f64().is_nan());
        assert!(FieldValue::Float(f64::NAN).is_missing());
        assert!(!FieldValue::Boolean(false).is_missing());
    }

    #[test]
    fn test_from_msgpack() {
        assert_eq!(FieldValue::from_msgpack(&Value::from(7)), FieldValue::Integer(7));
        assert_eq!(FieldValue::from_msgpack(&Value::from(1.5)), FieldValue::Float(1.5));
        assert_eq!(
            FieldValue::from_msgpack(&Value::from("abc")),
            FieldValue::Text("abc".to_string())
        );
        assert_eq!(FieldValue::from_msgpack(&Value::Nil), FieldValue::Missing);
    }

    #[test]
    fn test_format_data() {
        let v = Value::Array(vec![Value::from("Name"), Value::from(3)]);
        assert_eq!(format_data(&v), "['Name', 3]");
        assert_eq!(format_data(&Value::from("GPS")), "GPS");
        assert_eq!(format_data(&Value::Binary(vec![0x10, 0xab])), "10ab");
    }

    #[test]
    fn test_missing_serializes_as_null() {
        let json = serde_json::to_string(&vec![
            FieldValue::Missing,
            FieldValue::Float(f64::NAN),
            FieldValue::Integer(3),
        ])
        .unwrap();
        assert_eq!(json, "[null,null,3]");
    }
}
