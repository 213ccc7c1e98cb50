//! Values that claim arguments can hold.
//!
//! Primitive values (booleans, numbers, strings, null) compare by value and
//! can be indexed. Structured values are opaque payloads (corner points,
//! transforms, canvas handles) that compare by instance: two structurally
//! identical payloads built separately are different values.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Possible values a claim argument can hold.
///
/// # Examples
///
/// ```
/// use factlog::Value;
///
/// assert_eq!(Value::Int(2), Value::Float(2.0));
/// assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
///
/// let point = Value::structured(serde_json::json!({"x": 1, "y": 2}));
/// assert_eq!(point, point.clone());
/// assert_ne!(point, Value::structured(serde_json::json!({"x": 1, "y": 2})));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Structured(Arc<serde_json::Value>),
    Null,
}

/// Hashable key for a primitive value, consistent with `Value` equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Bool(bool),
    /// Integers, and floats with an exact integer value.
    Int(i64),
    /// Bit pattern of a non-integral float (never `NaN`).
    Float(u64),
    String(String),
    Null,
}

// i64 range expressed in f64; the upper bound is exclusive.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F: f64 = 9_223_372_036_854_775_808.0;

#[allow(clippy::cast_possible_truncation)]
fn exact_int(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && (I64_MIN_F..I64_MAX_F).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

impl Value {
    /// Wraps a JSON payload as a structured value.
    #[must_use]
    pub fn structured(value: serde_json::Value) -> Self {
        Self::Structured(Arc::new(value))
    }

    /// Serializes any serde type into a structured value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::structured(serde_json::to_value(value)?))
    }

    /// Returns true for every variant except `Structured`.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        !matches!(self, Self::Structured(_))
    }

    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// Deserializes a structured value into a typed payload.
    pub fn to_typed<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.as_structured()
            .and_then(|v| T::deserialize(v).ok())
    }

    /// Returns the index key, or `None` for values that cannot be indexed
    /// (structured payloads and `NaN`).
    #[must_use]
    pub fn index_key(&self) -> Option<IndexKey> {
        match self {
            Self::Bool(v) => Some(IndexKey::Bool(*v)),
            Self::Int(v) => Some(IndexKey::Int(*v)),
            Self::Float(v) if v.is_nan() => None,
            Self::Float(v) => Some(match exact_int(*v) {
                Some(i) => IndexKey::Int(i),
                None => IndexKey::Float(v.to_bits()),
            }),
            Self::String(v) => Some(IndexKey::String(v.clone())),
            Self::Null => Some(IndexKey::Null),
            Self::Structured(_) => None,
        }
    }

    /// JSON rendering used by logs and diagnostics.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::Structured(v) => v.as_ref().clone(),
            Self::Null => serde_json::Value::Null,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Structured(_) => "structured",
            Self::Null => "null",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => {
                exact_int(*b) == Some(*a)
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Structured(a), Self::Structured(b)) => Arc::ptr_eq(a, b),
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Structured(v) => write!(f, "{v}"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::structured(v)
    }
}
