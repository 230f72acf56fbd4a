//! Configuration values and scalar coercion.
//!
//! [`Value`] is the dynamic result of evaluating configuration expressions. The
//! binder projects it onto typed config objects using the coercions below.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Numeric configuration value. Integers stay exact until an operation needs a float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Parse a decimal literal. Anything with a fraction or exponent becomes a float.
    pub fn parse(text: &str) -> Option<Number> {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Int(i));
        }
        text.parse::<f64>().ok().map(Number::Float)
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Exact integer view; floats qualify only when they carry no fraction.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
            Number::Float(_) => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Dynamically typed configuration value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn int(i: i64) -> Self {
        Value::Number(Number::Int(i))
    }

    pub fn float(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Number(_) | Value::String(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key when the value is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

/// Scalar coercion failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoerceError {
    #[error("invalid {target} value {value}")]
    InvalidValue { target: &'static str, value: String },
    #[error("unsupported type {found}, expected {target}")]
    UnsupportedType {
        target: &'static str,
        found: &'static str,
    },
}

impl CoerceError {
    fn invalid(target: &'static str, value: &Value) -> Self {
        CoerceError::InvalidValue {
            target,
            value: value.to_string(),
        }
    }
}

/// Priority assigned when a `priority` attribute is not a number.
pub const FALLBACK_PRIORITY: i64 = 999;

// Longest suffix first: "ms" must win over "s" and "m".
const DURATION_UNITS: [(&str, i64); 4] = [
    ("ms", 1_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
];

/// Parses `<integer><ms|s|m|h>` into nanoseconds.
pub fn parse_duration_nanos(text: &str) -> Option<i64> {
    let (digits, multiplier) = DURATION_UNITS
        .iter()
        .find_map(|(suffix, mult)| text.strip_suffix(suffix).map(|d| (d, *mult)))?;
    digits.parse::<i64>().ok()?.checked_mul(multiplier)
}

pub fn to_i64(value: &Value) -> Result<i64, CoerceError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| CoerceError::invalid("integer", value)),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| parse_duration_nanos(s))
            .ok_or_else(|| CoerceError::invalid("integer", value)),
        _ => Err(CoerceError::invalid("integer", value)),
    }
}

pub fn to_u64(value: &Value) -> Result<u64, CoerceError> {
    let parsed = match value {
        Value::Number(Number::Int(i)) => u64::try_from(*i).ok(),
        Value::Number(Number::Float(f)) => {
            if f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64 {
                Some(*f as u64)
            } else {
                None
            }
        }
        Value::String(s) => s
            .parse::<u64>()
            .ok()
            .or_else(|| parse_duration_nanos(s).and_then(|n| u64::try_from(n).ok())),
        _ => None,
    };
    parsed.ok_or_else(|| CoerceError::invalid("unsigned integer", value))
}

pub fn to_f64(value: &Value) -> Result<f64, CoerceError> {
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .or_else(|| parse_duration_nanos(s).map(|n| n as f64))
            .ok_or_else(|| CoerceError::invalid("float", value)),
        _ => Err(CoerceError::invalid("float", value)),
    }
}

pub fn to_bool(value: &Value) -> Result<bool, CoerceError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" => Ok(true),
            "false" | "f" | "no" | "n" => Ok(false),
            _ => Err(CoerceError::invalid("bool", value)),
        },
        _ => Err(CoerceError::invalid("bool", value)),
    }
}

pub fn to_str(value: &Value) -> Result<&str, CoerceError> {
    value.as_str().ok_or(CoerceError::UnsupportedType {
        target: "string",
        found: value.type_name(),
    })
}

/// Numbers truncate toward zero; every other shape yields [`FALLBACK_PRIORITY`].
pub fn priority_of(value: &Value) -> i64 {
    match value {
        Value::Number(Number::Int(i)) => *i,
        Value::Number(Number::Float(f)) if f.is_finite() => f.trunc() as i64,
        _ => FALLBACK_PRIORITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_suffixes_scale_to_nanoseconds() {
        assert_eq!(to_i64(&"2h".into()).unwrap(), 7_200_000_000_000);
        assert_eq!(to_i64(&"3m".into()).unwrap(), 180_000_000_000);
        assert_eq!(to_i64(&"5s".into()).unwrap(), 5_000_000_000);
        assert_eq!(to_i64(&"250ms".into()).unwrap(), 250_000_000);
        assert_eq!(to_u64(&"1s".into()).unwrap(), 1_000_000_000);
        assert_eq!(to_f64(&"2h".into()).unwrap(), 7.2e12);
    }

    #[test]
    fn malformed_durations_are_invalid() {
        for text in ["1.5h", "h", "5d", "ms", "abc"] {
            let err = to_i64(&text.into()).unwrap_err();
            assert!(matches!(err, CoerceError::InvalidValue { .. }), "{text}");
        }
    }

    #[test]
    fn integers_reject_fractions_and_negative_unsigned() {
        assert_eq!(to_i64(&Value::float(42.0)).unwrap(), 42);
        assert!(to_i64(&Value::float(1.5)).is_err());
        assert!(to_u64(&Value::int(-1)).is_err());
        assert_eq!(to_u64(&"17".into()).unwrap(), 17);
    }

    #[test]
    fn bool_literals_are_case_insensitive() {
        for text in ["true", "T", "Yes", "y"] {
            assert!(to_bool(&text.into()).unwrap(), "{text}");
        }
        for text in ["FALSE", "f", "no", "N"] {
            assert!(!to_bool(&text.into()).unwrap(), "{text}");
        }
        assert!(to_bool(&"maybe".into()).is_err());
        assert!(to_bool(&Value::int(1)).is_err());
    }

    #[test]
    fn priority_truncates_numbers_and_falls_back_otherwise() {
        assert_eq!(priority_of(&Value::int(201)), 201);
        assert_eq!(priority_of(&Value::float(12.9)), 12);
        assert_eq!(priority_of(&"100".into()), FALLBACK_PRIORITY);
        assert_eq!(priority_of(&Value::Null), FALLBACK_PRIORITY);
    }

    #[test]
    fn display_renders_literal_form() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::List(vec![Value::int(1), "x".into()]));
        assert_eq!(Value::Object(map).to_string(), r#"{a = [1, "x"]}"#);
        assert_eq!(Value::float(2.5).to_string(), "2.5");
    }
}
