//! Sky position plus distance, matched in Cartesian space.

use super::cartesian::IsotropicEngine;
use super::sky::radec_infos;
use super::{BinKey, EngineOps, EngineParam, no_such_param};
use crate::match_error::MatchError;
use crate::pixel::sphere::{is_sky_position, radec_to_xyz};
use crate::table::Value;
use crate::tuple::TupleInfo;

/// Matches `(ra, dec, distance)` triples within a fixed spatial separation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarEngine {
    space: IsotropicEngine,
}

impl Default for PolarEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarEngine {
    pub fn new() -> Self {
        Self {
            space: IsotropicEngine::new(3),
        }
    }

    fn position(t: &[Value]) -> Option<[f64; 3]> {
        let [ra, dec, r] = match t {
            [a, b, c, ..] => [a, b, c].map(Value::to_f64),
            _ => return None,
        };
        if !is_sky_position(ra, dec) || !r.is_finite() {
            return None;
        }
        Some(radec_to_xyz(ra, dec).map(|x| x * r))
    }
}

impl EngineOps for PolarEngine {
    fn name(&self) -> String {
        "sky3d".to_owned()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        let [ra, dec] = radec_infos();
        vec![
            ra,
            dec,
            TupleInfo::number("Distance", "Distance from origin"),
        ]
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::number("Error", "Maximum spatial separation for match"),
            self.space.error(),
        )]
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        self.space.tuning_params()
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.space.set_match_param(0, value),
            _ => Err(no_such_param("sky3d", "match", index, 1)),
        }
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.space.set_tuning_param(0, value),
            _ => Err(no_such_param("sky3d", "tuning", index, 1)),
        }
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Distance",
            "Spatial distance between matched points",
        ))
    }

    fn score_scale(&self) -> f64 {
        self.space.error()
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        match Self::position(tuple) {
            Some(xyz) => self.space.point_bins(&xyz, out),
            None => Ok(()),
        }
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let pa = Self::position(a)?;
        let pb = Self::position(b)?;
        self.space.point_score(&pa, &pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::reals;

    #[test]
    fn distance_matters() {
        let mut e = PolarEngine::new();
        e.set_match_param(0, 0.5).unwrap();
        let a = reals(&[0.3, 0.1, 10.0]);
        let b = reals(&[0.3, 0.1, 10.4]);
        let c = reals(&[0.3, 0.1, 11.0]);
        let s = e.score(&a, &b).unwrap();
        assert!((s - 0.4).abs() < 1e-9);
        assert_eq!(e.score(&a, &c), None);
        let (mut ka, mut kb) = (Vec::new(), Vec::new());
        e.bins(&a, &mut ka).unwrap();
        e.bins(&b, &mut kb).unwrap();
        assert!(ka.iter().any(|k| kb.contains(k)));
    }

    #[test]
    fn separated_directions_fail_and_origin_is_fine() {
        let e = PolarEngine::new();
        assert_eq!(e.score(&reals(&[0.0, 0.0, 0.0]), &reals(&[2.0, 1.0, 0.0])), Some(0.0));
        assert_eq!(e.score(&reals(&[0.0, 0.0, 5.0]), &reals(&[0.0, 1.0, 5.0])), None);
        assert_eq!(e.score(&reals(&[0.0, 0.0, f64::NAN]), &reals(&[0.0, 0.0, 1.0])), None);
    }
}
