//! Wrapper presenting an engine's angles in degrees and arcseconds.
//!
//! Positions and position angles appear in degrees, angular sizes in
//! arcseconds. Tuples are converted to radians once, in [`HumanEngine::to_native`],
//! so binning and scoring run on native values.

use super::{BinKey, EngineOps, EngineParam, MatchEngine};
use crate::match_error::MatchError;
use crate::table::Value;
use crate::tuple::{Tuple, TupleInfo};

fn humanize(info: TupleInfo) -> TupleInfo {
    match info.angle {
        Some(role) => info.with_unit(Some(role.human_unit().to_owned())),
        None => info,
    }
}

fn factor(info: &TupleInfo) -> f64 {
    info.angle.map_or(1.0, |role| role.to_radians_factor())
}

#[derive(Debug, Clone, PartialEq)]
pub struct HumanEngine {
    inner: Box<MatchEngine>,
    tuple_factors: Vec<f64>,
}

impl HumanEngine {
    pub fn new(inner: MatchEngine) -> Self {
        let tuple_factors = inner.tuple_infos().iter().map(factor).collect();
        Self {
            inner: Box::new(inner),
            tuple_factors,
        }
    }

    pub fn inner(&self) -> &MatchEngine {
        &self.inner
    }

    /// Convert a tuple from human units to the wrapped engine's units.
    /// Non-numeric values in angle slots are left alone.
    pub fn to_native(&self, values: Vec<Value>) -> Tuple {
        let converted = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| match self.tuple_factors.get(i) {
                Some(&f) if f != 1.0 => match v.as_f64() {
                    Some(x) => Value::Real(x * f),
                    None => v,
                },
                _ => v,
            })
            .collect();
        Tuple::new(converted)
    }

    fn score_factor(&self) -> f64 {
        self.inner.score_info().as_ref().map_or(1.0, factor)
    }

    fn set_param(
        &mut self,
        index: usize,
        value: f64,
        params: fn(&MatchEngine) -> Vec<EngineParam>,
        set: fn(&mut MatchEngine, usize, f64) -> Result<(), MatchError>,
    ) -> Result<(), MatchError> {
        let f = params(self.inner.as_ref()).get(index).map_or(1.0, |p| factor(&p.info));
        set(self.inner.as_mut(), index, value * f)
    }
}

fn humanize_params(params: Vec<EngineParam>) -> Vec<EngineParam> {
    params
        .into_iter()
        .map(|p| {
            let value = p.value / factor(&p.info);
            EngineParam::new(humanize(p.info), value)
        })
        .collect()
}

impl EngineOps for HumanEngine {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        self.inner.tuple_infos().into_iter().map(humanize).collect()
    }

    fn match_params(&self) -> Vec<EngineParam> {
        humanize_params(self.inner.match_params())
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        humanize_params(self.inner.tuning_params())
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        self.set_param(index, value, MatchEngine::match_params, MatchEngine::set_match_param)
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        self.set_param(index, value, MatchEngine::tuning_params, MatchEngine::set_tuning_param)
    }

    fn score_info(&self) -> Option<TupleInfo> {
        self.inner.score_info().map(humanize)
    }

    fn score_scale(&self) -> f64 {
        self.inner.score_scale() / self.score_factor()
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        self.inner.bins(tuple, out)
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        self.inner.score(a, b).map(|s| s / self.score_factor())
    }
}
