use super::{BinKey, EngineOps, EngineParam, no_such_param};
use crate::match_error::MatchError;
use crate::table::Value;
use crate::tuple::TupleInfo;

/// Hashable, normalised form of a value for exact matching.
///
/// Integral reals compare equal to the corresponding integers; blanks
/// (null or NaN) have no key and never match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExactKey {
    Bool(bool),
    Int(i64),
    Real(u64),
    Text(Box<str>),
}

impl ExactKey {
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ExactKey::Bool(*b)),
            Value::Int(i) => Some(ExactKey::Int(*i)),
            Value::Real(x) => {
                if x.is_nan() {
                    None
                } else if x.fract() == 0.0 && x.abs() < 9.0e15 {
                    Some(ExactKey::Int(*x as i64))
                } else {
                    Some(ExactKey::Real(x.to_bits()))
                }
            }
            Value::Text(s) => Some(ExactKey::Text(s.as_str().into())),
        }
    }
}

/// Matches rows whose single key value is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExactEngine;

impl EngineOps for ExactEngine {
    fn name(&self) -> String {
        "exact".to_owned()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        vec![TupleInfo::any("Matched Value", "Value for exact match")]
    }

    fn match_params(&self) -> Vec<EngineParam> {
        Vec::new()
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        Vec::new()
    }

    fn set_match_param(&mut self, index: usize, _value: f64) -> Result<(), MatchError> {
        Err(no_such_param("exact", "match", index, 0))
    }

    fn set_tuning_param(&mut self, index: usize, _value: f64) -> Result<(), MatchError> {
        Err(no_such_param("exact", "tuning", index, 0))
    }

    fn score_info(&self) -> Option<TupleInfo> {
        None
    }

    fn score_scale(&self) -> f64 {
        0.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        if let Some(key) = tuple.first().and_then(ExactKey::of) {
            out.push(BinKey::Exact(key));
        }
        Ok(())
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let ka = ExactKey::of(a.first()?)?;
        let kb = ExactKey::of(b.first()?)?;
        (ka == kb).then_some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(a: Value, b: Value) -> Option<f64> {
        ExactEngine.score(&[a], &[b])
    }

    #[test]
    fn equal_values_match_with_zero() {
        assert_eq!(score(Value::Int(3), Value::Real(3.0)), Some(0.0));
        assert_eq!(score(Value::from("m31"), Value::from("m31")), Some(0.0));
        assert_eq!(score(Value::from("m31"), Value::from("M31")), None);
        assert_eq!(score(Value::Real(0.5), Value::Real(0.5)), Some(0.0));
        assert_eq!(score(Value::Real(-0.0), Value::Int(0)), Some(0.0));
    }

    #[test]
    fn blanks_never_match() {
        assert_eq!(score(Value::Null, Value::Null), None);
        assert_eq!(score(Value::Real(f64::NAN), Value::Real(f64::NAN)), None);
        let mut bins = Vec::new();
        ExactEngine.bins(&[Value::Null], &mut bins).unwrap();
        assert!(bins.is_empty());
    }

    #[test]
    fn equal_values_share_a_bin() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        ExactEngine.bins(&[Value::Int(7)], &mut a).unwrap();
        ExactEngine.bins(&[Value::Real(7.0)], &mut b).unwrap();
        assert_eq!(a, b);
    }
}
