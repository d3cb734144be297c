//! Structured fields attached to log records
//!
//! A [`Field`] is an immutable key/value pair. Values are captured eagerly into
//! a [`FieldValue`] so records can be shared across every destination without
//! re-borrowing caller data.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Key used by [`Field::error`]
pub const ERROR_KEY: &str = "error";

/// Value type for structured logging fields
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// An error captured as its message plus its Rust type name
    Error { message: String, type_name: String },
    /// Rendered as a human-readable unit string, e.g. `5ms`
    Duration(Duration),
    /// Arbitrary structured value, already serialized
    Any(serde_json::Value),
    Null,
}

impl FieldValue {
    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                // NaN and infinities have no JSON number form
                .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Error { message, .. } => serde_json::Value::String(message.clone()),
            FieldValue::Duration(d) => serde_json::Value::String(format_duration(*d)),
            FieldValue::Any(v) => v.clone(),
            FieldValue::Null => serde_json::Value::Null,
        }
    }

    /// The string content, when this value is a plain string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Human-readable duration, `5ms`, `2s`, `1m 30s`
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    humantime::format_duration(d).to_string()
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Error { message, .. } => write!(f, "{}", message),
            FieldValue::Duration(d) => write!(f, "{}", format_duration(*d)),
            FieldValue::Any(v) => write!(f, "{}", v),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<usize> for FieldValue {
    fn from(i: usize) -> Self {
        match i64::try_from(i) {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::Any(serde_json::Value::from(i)),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(i: u64) -> Self {
        match i64::try_from(i) {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::Any(serde_json::Value::from(i)),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Duration> for FieldValue {
    fn from(d: Duration) -> Self {
        FieldValue::Duration(d)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Any(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One structured attribute of a log record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    key: String,
    value: FieldValue,
}

impl Field {
    /// Create a field from any convertible value
    ///
    /// An empty key is replaced by `"_"` so every field stays addressable.
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let mut key = key.into();
        if key.is_empty() {
            key.push('_');
        }
        Self {
            key,
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, FieldValue::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, FieldValue::Int(value))
    }

    pub fn float64(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, FieldValue::Float(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, FieldValue::Bool(value))
    }

    /// Capture an error under the fixed key `"error"`
    pub fn error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        Self::new(
            ERROR_KEY,
            FieldValue::Error {
                message: err.to_string(),
                type_name: std::any::type_name::<E>().to_string(),
            },
        )
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, FieldValue::Duration(value))
    }

    /// Normalize a `chrono` time delta into a duration field
    ///
    /// Negative deltas cannot be held by `std::time::Duration`; they are
    /// captured as a string with a leading minus sign.
    pub fn chrono_duration(key: impl Into<String>, value: chrono::Duration) -> Self {
        match value.to_std() {
            Ok(d) => Self::duration(key, d),
            Err(_) => {
                let positive = (-value).to_std().unwrap_or_default();
                Self::string(key, format!("-{}", format_duration(positive)))
            }
        }
    }

    /// Capture an arbitrary serializable value
    ///
    /// Maps, sequences and structs are serialized recursively. A value serde
    /// refuses to encode (for example a map with non-string keys) is kept as a
    /// string describing the failure instead.
    pub fn any<T>(key: impl Into<String>, value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        let value = match serde_json::to_value(value) {
            Ok(v) => FieldValue::Any(v),
            Err(e) => FieldValue::String(format!("<unencodable value: {}>", e)),
        };
        Self::new(key, value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

pub fn string_field(key: impl Into<String>, value: impl Into<String>) -> Field {
    Field::string(key, value)
}

pub fn int_field(key: impl Into<String>, value: i64) -> Field {
    Field::int(key, value)
}

pub fn float64_field(key: impl Into<String>, value: f64) -> Field {
    Field::float64(key, value)
}

pub fn error_field<E: std::error::Error + ?Sized>(err: &E) -> Field {
    Field::error(err)
}

pub fn duration_field(key: impl Into<String>, value: Duration) -> Field {
    Field::duration(key, value)
}

pub fn any_field<T: Serialize + ?Sized>(key: impl Into<String>, value: &T) -> Field {
    Field::any(key, value)
}

/// Result of pairing an alternating key/value list
#[derive(Debug, Default)]
pub(crate) struct PairedFields {
    pub fields: Vec<Field>,
    /// Values that appeared in key position but were not strings
    pub invalid: Vec<(FieldValue, FieldValue)>,
    /// Trailing key with no value
    pub dangling: Option<FieldValue>,
}

/// Interpret `keys_and_values` as `k1, v1, k2, v2, ...`
pub(crate) fn pair_keys_and_values(keys_and_values: &[FieldValue]) -> PairedFields {
    let mut paired = PairedFields::default();
    let mut chunks = keys_and_values.chunks_exact(2);

    for pair in chunks.by_ref() {
        let (key, value) = (&pair[0], &pair[1]);
        match key.as_str() {
            Some(k) => paired.fields.push(Field::new(k, value.clone())),
            None => paired.invalid.push((key.clone(), value.clone())),
        }
    }

    if let [last] = chunks.remainder() {
        paired.dangling = Some(last.clone());
    }

    paired
}
