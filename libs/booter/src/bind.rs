//! Binding of evaluated configuration values onto typed config objects.
//!
//! Every config type implements [`Bind`], usually through `#[derive(Bind)]`.
//! Binding happens in place, so defaults set by a factory's config constructor
//! survive for keys the configuration does not mention.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use crate::value::{self, CoerceError, Number, Value};

pub use booter_macros::Bind;

/// Binder failure, qualified by the path of the offending value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("{path}, {reason}")]
    InvalidValue { path: String, reason: String },
    #[error("{path} should be {expected}")]
    TypeMismatch { path: String, expected: String },
    #[error("{field} field not found in {path}")]
    UnknownField { path: String, field: String },
    #[error("{path} has unsupported type {found}")]
    UnsupportedType { path: String, found: String },
}

impl BindError {
    pub fn path(&self) -> &str {
        match self {
            BindError::InvalidValue { path, .. }
            | BindError::TypeMismatch { path, .. }
            | BindError::UnknownField { path, .. }
            | BindError::UnsupportedType { path, .. } => path,
        }
    }

    pub fn type_mismatch(path: &str, expected: impl Into<String>) -> Self {
        BindError::TypeMismatch {
            path: path.to_owned(),
            expected: expected.into(),
        }
    }

    pub fn unknown_field(path: &str, field: &str) -> Self {
        BindError::UnknownField {
            path: path.to_owned(),
            field: field.to_owned(),
        }
    }

    pub fn invalid_value(path: &str, reason: impl ToString) -> Self {
        BindError::InvalidValue {
            path: path.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// A type that can absorb a [`Value`] at a given path.
pub trait Bind {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError>;
}

/// `parent.field`
pub fn field_path(parent: &str, field: &str) -> String {
    format!("{parent}.{field}")
}

/// Unwraps an object value for struct binding.
pub fn expect_object<'a>(
    path: &str,
    value: &'a Value,
    type_name: &str,
) -> Result<&'a BTreeMap<String, Value>, BindError> {
    value
        .as_object()
        .ok_or_else(|| BindError::type_mismatch(path, format!("object as {type_name}")))
}

/// Unwraps a string value for fieldless enum binding.
pub fn expect_variant<'a>(
    path: &str,
    value: &'a Value,
    type_name: &str,
) -> Result<&'a str, BindError> {
    value
        .as_str()
        .ok_or_else(|| BindError::type_mismatch(path, format!("string as {type_name}")))
}

/// Type name without its module path, e.g. `AmodConf` for `my_crate::mods::AmodConf`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let end = full.find('<').unwrap_or(full.len());
    let start = full[..end].rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}

fn coerce<T>(
    path: &str,
    value: &Value,
    expected: &str,
    f: impl FnOnce(&Value) -> Result<T, CoerceError>,
) -> Result<T, BindError> {
    match value {
        Value::Number(_) | Value::String(_) => {
            f(value).map_err(|e| BindError::invalid_value(path, e))
        }
        _ => Err(BindError::type_mismatch(path, expected)),
    }
}

impl Bind for String {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        match value {
            Value::String(s) => {
                self.clone_from(s);
                Ok(())
            }
            _ => Err(BindError::type_mismatch(path, "string")),
        }
    }
}

impl Bind for bool {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        match value {
            Value::Bool(_) | Value::String(_) => {
                *self = value::to_bool(value).map_err(|e| BindError::invalid_value(path, e))?;
                Ok(())
            }
            _ => Err(BindError::type_mismatch(path, "bool")),
        }
    }
}

macro_rules! bind_integer {
    ($coerce:path, $expected:literal => $($t:ty),*) => {$(
        impl Bind for $t {
            fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
                let wide = coerce(path, value, $expected, $coerce)?;
                *self = <$t>::try_from(wide).map_err(|_| {
                    BindError::invalid_value(
                        path,
                        format!("{value} is out of range for {}", stringify!($t)),
                    )
                })?;
                Ok(())
            }
        }
    )*};
}

bind_integer!(value::to_i64, "int" => i8, i16, i32, i64, isize);
bind_integer!(value::to_u64, "uint" => u8, u16, u32, u64, usize);

impl Bind for f64 {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        *self = coerce(path, value, "float", value::to_f64)?;
        Ok(())
    }
}

impl Bind for f32 {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        *self = coerce(path, value, "float", value::to_f64)? as f32;
        Ok(())
    }
}

/// Durations bind from nanoseconds, so `"5s"` and `5000000000` are equivalent.
impl Bind for Duration {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        *self = Duration::from_nanos(coerce(path, value, "duration", value::to_u64)?);
        Ok(())
    }
}

impl Bind for url::Url {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        let text = value
            .as_str()
            .ok_or_else(|| BindError::type_mismatch(path, "url"))?;
        *self = url::Url::parse(text)
            .map_err(|e| BindError::invalid_value(path, format!("should be url, {e}")))?;
        Ok(())
    }
}

impl Bind for PathBuf {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        let text = value
            .as_str()
            .ok_or_else(|| BindError::type_mismatch(path, "path string"))?;
        *self = PathBuf::from(text);
        Ok(())
    }
}

impl<T: Bind + Default> Bind for Option<T> {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        self.get_or_insert_with(T::default).bind(path, value)
    }
}

impl<T: Bind + ?Sized> Bind for Box<T> {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        (**self).bind(path, value)
    }
}

impl<T: Bind + Default> Bind for Vec<T> {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        let Value::List(items) = value else {
            return Err(BindError::type_mismatch(path, "list"));
        };
        let mut bound = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let mut elem = T::default();
            elem.bind(&format!("{path}[{i}]"), item)?;
            bound.push(elem);
        }
        *self = bound;
        Ok(())
    }
}

fn bind_entries<T: Bind + Default>(
    path: &str,
    value: &Value,
    mut insert: impl FnMut(String, T),
) -> Result<(), BindError> {
    let Value::Object(entries) = value else {
        return Err(BindError::type_mismatch(path, "map"));
    };
    for (key, item) in entries {
        let mut elem = T::default();
        elem.bind(&format!("{path}[\"{key}\"]"), item)?;
        insert(key.clone(), elem);
    }
    Ok(())
}

impl<T: Bind + Default> Bind for HashMap<String, T> {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        let mut map = HashMap::new();
        bind_entries(path, value, |k, v| {
            map.insert(k, v);
        })?;
        *self = map;
        Ok(())
    }
}

impl<T: Bind + Default> Bind for BTreeMap<String, T> {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        let mut map = BTreeMap::new();
        bind_entries(path, value, |k, v| {
            map.insert(k, v);
        })?;
        *self = map;
        Ok(())
    }
}

impl Bind for Value {
    fn bind(&mut self, _path: &str, value: &Value) -> Result<(), BindError> {
        self.clone_from(value);
        Ok(())
    }
}

impl Bind for serde_json::Value {
    fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        *self = to_json(path, value)?;
        Ok(())
    }
}

fn to_json(path: &str, value: &Value) -> Result<serde_json::Value, BindError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(Number::Int(i)) => serde_json::Value::from(*i),
        Value::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| BindError::invalid_value(path, format!("{f} is not representable")))?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_json(&format!("{path}[{i}]"), item))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), to_json(&format!("{path}[\"{k}\"]"), v)?)))
                .collect::<Result<_, BindError>>()?,
        ),
    })
}
