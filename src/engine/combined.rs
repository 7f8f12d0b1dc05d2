//! Conjunction of several engines over concatenated tuples.
//!
//! Tuples, match parameters and tuning parameters of the parts are laid
//! end to end. A pair matches only if every part matches. The combined
//! score is the root mean square of the part scores, each divided by that
//! part's score scale.

use super::{BinKey, EngineOps, EngineParam, MatchEngine, no_such_param};
use crate::match_error::MatchError;
use crate::table::Value;
use crate::tuple::TupleInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedEngine {
    parts: Vec<MatchEngine>,
    /// Start of each part's slice in the combined tuple, plus the total.
    offsets: Vec<usize>,
}

impl CombinedEngine {
    pub fn new(parts: Vec<MatchEngine>) -> Result<Self, MatchError> {
        if parts.is_empty() || parts.len() > u8::MAX as usize {
            return Err(MatchError::Config(format!(
                "combined engine needs between 1 and {} parts, got {}",
                u8::MAX,
                parts.len()
            )));
        }
        let mut offsets = Vec::with_capacity(parts.len() + 1);
        let mut at = 0;
        offsets.push(at);
        for p in &parts {
            at += p.tuple_infos().len();
            offsets.push(at);
        }
        Ok(Self { parts, offsets })
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[MatchEngine] {
        &self.parts
    }

    fn slice<'a>(&self, i: usize, t: &'a [Value]) -> Option<&'a [Value]> {
        t.get(self.offsets[i]..self.offsets[i + 1])
    }

    /// Locate the part owning flat parameter `index`.
    fn route(&self, index: usize, count: impl Fn(&MatchEngine) -> usize) -> Option<(usize, usize)> {
        let mut rest = index;
        for (i, p) in self.parts.iter().enumerate() {
            let n = count(p);
            if rest < n {
                return Some((i, rest));
            }
            rest -= n;
        }
        None
    }
}

impl EngineOps for CombinedEngine {
    fn name(&self) -> String {
        self.parts
            .iter()
            .map(EngineOps::name)
            .collect::<Vec<_>>()
            .join("+")
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        self.parts.iter().flat_map(EngineOps::tuple_infos).collect()
    }

    fn match_params(&self) -> Vec<EngineParam> {
        self.parts.iter().flat_map(EngineOps::match_params).collect()
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        self.parts.iter().flat_map(EngineOps::tuning_params).collect()
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match self.route(index, |p| p.match_params().len()) {
            Some((i, local)) => self.parts[i].set_match_param(local, value),
            None => Err(no_such_param(&self.name(), "match", index, self.match_params().len())),
        }
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match self.route(index, |p| p.tuning_params().len()) {
            Some((i, local)) => self.parts[i].set_tuning_param(local, value),
            None => Err(no_such_param(&self.name(), "tuning", index, self.tuning_params().len())),
        }
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Score",
            "Root mean square of the normalised scores of each part",
        ))
    }

    fn score_scale(&self) -> f64 {
        1.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        let start = out.len();
        let mut keys = Vec::new();
        for (i, p) in self.parts.iter().enumerate() {
            let Some(t) = self.slice(i, tuple) else {
                out.truncate(start);
                return Ok(());
            };
            keys.clear();
            p.bins(t, &mut keys)?;
            if keys.is_empty() {
                out.truncate(start);
                return Ok(());
            }
            out.extend(keys.drain(..).map(|k| BinKey::Part(i as u8, Box::new(k))));
        }
        Ok(())
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let mut sum = 0.0;
        for (i, p) in self.parts.iter().enumerate() {
            let s = p.score(self.slice(i, a)?, self.slice(i, b)?)?;
            let scale = p.score_scale();
            let norm = if scale > 0.0 { s / scale } else { s };
            sum += norm * norm;
        }
        Some((sum / self.parts.len() as f64).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExactEngine, IsotropicEngine};

    fn engine() -> CombinedEngine {
        let iso = IsotropicEngine::with_error(1, 2.0).unwrap();
        CombinedEngine::new(vec![MatchEngine::Isotropic(iso), MatchEngine::Exact(ExactEngine)]).unwrap()
    }

    fn row(x: f64, key: &str) -> Vec<Value> {
        vec![Value::Real(x), Value::from(key)]
    }

    #[test]
    fn all_parts_must_match() {
        let e = engine();
        assert_eq!(e.name(), "1d+exact");
        let s = e.score(&row(0.0, "a"), &row(1.0, "a")).unwrap();
        assert!((s - (0.125f64).sqrt()).abs() < 1e-12);
        assert_eq!(e.score(&row(0.0, "a"), &row(1.0, "b")), None);
        assert_eq!(e.score(&row(0.0, "a"), &row(3.0, "a")), None);
    }

    #[test]
    fn params_route_to_parts() {
        let mut e = engine();
        assert_eq!(e.match_params().len(), 1);
        e.set_match_param(0, 5.0).unwrap();
        assert_eq!(e.match_params()[0].value, 5.0);
        assert!(e.set_match_param(1, 1.0).is_err());
        e.set_tuning_param(0, 3.0).unwrap();
        assert!(e.set_tuning_param(1, 3.0).is_err());
    }

    #[test]
    fn bins_are_tagged_by_part() {
        let e = engine();
        let mut keys = Vec::new();
        e.bins(&row(0.5, "a"), &mut keys).unwrap();
        assert!(keys.iter().any(|k| k.part() == 0));
        assert!(keys.iter().any(|k| k.part() == 1));
        keys.clear();
        e.bins(&[Value::Real(0.5), Value::Null], &mut keys).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn empty_is_rejected() {
        assert!(CombinedEngine::new(Vec::new()).is_err());
    }
}
