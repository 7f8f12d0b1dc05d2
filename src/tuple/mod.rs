//! Match tuples: the per-row values a match engine compares.
//!
//! A [`Tuple`] is immutable once built. Its shape is declared by the engine
//! through a list of [`TupleInfo`]s and checked once, when the extraction
//! expressions are compiled against a table schema.

pub mod extract;

pub use extract::{ColumnExpr, ColumnExpressions, TupleExtractor, extract_tuples};

use crate::table::{Value, ValueKind};
use std::ops::Deref;

/// How an angular quantity is presented in human units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AngleRole {
    /// Positions and position angles; shown in degrees.
    Position,
    /// Radii, errors and separations; shown in arcseconds.
    Size,
}

impl AngleRole {
    /// Multiply a human-unit value by this to get radians.
    pub fn to_radians_factor(self) -> f64 {
        match self {
            AngleRole::Position => std::f64::consts::PI / 180.0,
            AngleRole::Size => std::f64::consts::PI / (180.0 * 3600.0),
        }
    }

    pub fn human_unit(self) -> &'static str {
        match self {
            AngleRole::Position => "deg",
            AngleRole::Size => "arcsec",
        }
    }
}

/// Metadata for one element of a match tuple (or a score, or a parameter).
#[derive(Debug, Clone, PartialEq)]
pub struct TupleInfo {
    pub name: String,
    pub kind: ValueKind,
    pub unit: Option<String>,
    pub description: String,
    /// Set for angles, which are radians natively.
    pub angle: Option<AngleRole>,
}

impl TupleInfo {
    pub fn number(name: &str, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: ValueKind::Number,
            unit: None,
            description: description.to_owned(),
            angle: None,
        }
    }

    pub fn angle(name: &str, description: &str, role: AngleRole) -> Self {
        Self {
            unit: Some("radians".to_owned()),
            angle: Some(role),
            ..Self::number(name, description)
        }
    }

    pub fn any(name: &str, description: &str) -> Self {
        Self {
            kind: ValueKind::Any,
            ..Self::number(name, description)
        }
    }

    /// Same element with a different unit label.
    pub(crate) fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }
}

/// Fixed-length, immutable sequence of values extracted from one row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple(Box<[Value]>);

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values.into_boxed_slice())
    }

    /// Numeric value of element `i`, NaN if it is blank or not a number.
    #[inline]
    pub fn number(&self, i: usize) -> f64 {
        self.0.get(i).map_or(f64::NAN, Value::to_f64)
    }
}

impl Deref for Tuple {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Shorthand for a tuple of reals, mostly for tests and benches.
pub fn reals(xs: &[f64]) -> Tuple {
    Tuple::new(xs.iter().map(|&x| Value::Real(x)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_access() {
        let t = Tuple::new(vec![Value::Int(2), Value::Null, Value::from("s")]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.number(0), 2.0);
        assert!(t.number(1).is_nan());
        assert!(t.number(2).is_nan());
        assert!(t.number(7).is_nan());
    }

    #[test]
    fn arcsec_factor() {
        let one_deg = 3600.0 * AngleRole::Size.to_radians_factor();
        assert!((one_deg - AngleRole::Position.to_radians_factor()).abs() < 1e-18);
    }
}
