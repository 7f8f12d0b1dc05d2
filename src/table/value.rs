//! Cell values shared by tables and match tuples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad type of a column or tuple element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Text,
    Bool,
    /// Accepts anything; used by the exact-value engine.
    Any,
}

impl ValueKind {
    /// Whether a column of kind `self` can feed a tuple slot of kind `slot`.
    pub fn fits(self, slot: ValueKind) -> bool {
        match slot {
            ValueKind::Any => true,
            ValueKind::Number => matches!(self, ValueKind::Number | ValueKind::Any),
            other => self == other || self == ValueKind::Any,
        }
    }
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Null, or a real NaN.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Real(x) => x.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::Real(x) => Some(x),
            _ => None,
        }
    }

    /// Numeric view used by geometric engines: anything non-numeric is NaN.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.as_f64().unwrap_or(f64::NAN)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) | Value::Real(_) => Some(ValueKind::Number),
            Value::Text(_) => Some(ValueKind::Text),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert!(Value::from("x").to_f64().is_nan());
        assert!(Value::Null.to_f64().is_nan());
        assert!(Value::Real(f64::NAN).is_blank());
        assert!(!Value::Int(0).is_blank());
        assert_eq!(Value::from(None::<f64>), Value::Null);
    }

    #[test]
    fn kind_compatibility() {
        assert!(ValueKind::Number.fits(ValueKind::Number));
        assert!(ValueKind::Text.fits(ValueKind::Any));
        assert!(!ValueKind::Text.fits(ValueKind::Number));
        assert!(!ValueKind::Bool.fits(ValueKind::Number));
        assert!(ValueKind::Any.fits(ValueKind::Number));
    }
}
