//! Cartesian engines with fixed or per-row tolerances.

use super::grid::cell_bins;
use super::{BinKey, EngineOps, EngineParam, axis_name, no_such_param, pad, positive};
use crate::match_error::MatchError;
use crate::table::Value;
use crate::tuple::TupleInfo;

fn bin_factor_param(value: f64) -> EngineParam {
    EngineParam::new(
        TupleInfo::number(
            "Bin Factor",
            "Scaling factor to adjust bin size; larger values mean larger bins",
        ),
        value,
    )
}

fn coord_infos(ndim: usize) -> Vec<TupleInfo> {
    (0..ndim)
        .map(|i| {
            let name = axis_name(i);
            let description = format!("Cartesian co-ordinate #{}", i + 1);
            TupleInfo::number(&name, &description)
        })
        .collect()
}

fn coords(t: &[Value], ndim: usize) -> Option<Vec<f64>> {
    if t.len() < ndim {
        return None;
    }
    let xs: Vec<f64> = t[..ndim].iter().map(Value::to_f64).collect();
    xs.iter().all(|x| x.is_finite()).then_some(xs)
}

/// Sum of squared per-axis differences, each scaled by `weight(i)`.
#[inline]
fn weighted_d2(a: &[Value], b: &[Value], ndim: usize, weight: impl Fn(usize) -> f64) -> f64 {
    (0..ndim)
        .map(|i| {
            let d = (a[i].to_f64() - b[i].to_f64()) / weight(i);
            d * d
        })
        .sum()
}

/// Matches points within a fixed Euclidean distance.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotropicEngine {
    ndim: usize,
    err: f64,
    bin_factor: f64,
}

impl IsotropicEngine {
    pub fn new(ndim: usize) -> Self {
        Self {
            ndim,
            err: 1.0,
            bin_factor: 1.0,
        }
    }

    pub fn with_error(ndim: usize, err: f64) -> Result<Self, MatchError> {
        let mut e = Self::new(ndim);
        e.set_match_param(0, err)?;
        Ok(e)
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn error(&self) -> f64 {
        self.err
    }

    /// Bin keys for a point already in native co-ordinates.
    pub(crate) fn point_bins(&self, xs: &[f64], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        let half = vec![pad(0.5 * self.err); self.ndim];
        let cell = vec![self.err * self.bin_factor; self.ndim];
        cell_bins(xs, &half, &cell, out)
    }

    pub(crate) fn point_score(&self, a: &[f64], b: &[f64]) -> Option<f64> {
        let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        let d = d2.sqrt();
        (d <= self.err).then_some(d)
    }
}

impl EngineOps for IsotropicEngine {
    fn name(&self) -> String {
        format!("{}d", self.ndim)
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        coord_infos(self.ndim)
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::number("Error", "Maximum Cartesian separation for match"),
            self.err,
        )]
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![bin_factor_param(self.bin_factor)]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.err = positive("Error", value)?,
            _ => return Err(no_such_param(&self.name(), "match", index, 1)),
        }
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.bin_factor = positive("Bin Factor", value)?,
            _ => return Err(no_such_param(&self.name(), "tuning", index, 1)),
        }
        Ok(())
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Separation",
            "Spatial distance between matched points",
        ))
    }

    fn score_scale(&self) -> f64 {
        self.err
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        match coords(tuple, self.ndim) {
            Some(xs) => self.point_bins(&xs, out),
            None => Ok(()),
        }
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let d = weighted_d2(a, b, self.ndim, |_| 1.0).sqrt();
        (d <= self.err).then_some(d)
    }
}

/// Matches points inside a per-axis error ellipsoid.
#[derive(Debug, Clone, PartialEq)]
pub struct AnisotropicEngine {
    errs: Vec<f64>,
    bin_factor: f64,
}

impl AnisotropicEngine {
    pub fn new(ndim: usize) -> Self {
        Self {
            errs: vec![1.0; ndim],
            bin_factor: 1.0,
        }
    }
}

impl EngineOps for AnisotropicEngine {
    fn name(&self) -> String {
        format!("{}d_anisotropic", self.errs.len())
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        coord_infos(self.errs.len())
    }

    fn match_params(&self) -> Vec<EngineParam> {
        self.errs
            .iter()
            .enumerate()
            .map(|(i, &e)| {
                let name = format!("Error in {}", axis_name(i));
                EngineParam::new(
                    TupleInfo::number(&name, "Axis length of error ellipse"),
                    e,
                )
            })
            .collect()
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![bin_factor_param(self.bin_factor)]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        let n = self.errs.len();
        let slot = self
            .errs
            .get_mut(index)
            .ok_or_else(|| no_such_param(&format!("{n}d_anisotropic"), "match", index, n))?;
        *slot = positive(&format!("Error in {}", axis_name(index)), value)?;
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.bin_factor = positive("Bin Factor", value)?,
            _ => return Err(no_such_param(&self.name(), "tuning", index, 1)),
        }
        Ok(())
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Separation",
            "Normalised distance between points; 1 is the edge of the error ellipse",
        ))
    }

    fn score_scale(&self) -> f64 {
        1.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        let Some(xs) = coords(tuple, self.errs.len()) else {
            return Ok(());
        };
        let half: Vec<f64> = self.errs.iter().map(|e| pad(0.5 * e)).collect();
        let cell: Vec<f64> = self.errs.iter().map(|e| e * self.bin_factor).collect();
        cell_bins(&xs, &half, &cell, out)
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let d = weighted_d2(a, b, self.errs.len(), |i| self.errs[i]).sqrt();
        (d <= 1.0).then_some(d)
    }
}

/// Matches points inside a per-axis error box.
#[derive(Debug, Clone, PartialEq)]
pub struct CuboidEngine {
    half_widths: Vec<f64>,
    bin_factor: f64,
}

impl CuboidEngine {
    pub fn new(ndim: usize) -> Self {
        Self {
            half_widths: vec![1.0; ndim],
            bin_factor: 1.0,
        }
    }
}

impl EngineOps for CuboidEngine {
    fn name(&self) -> String {
        format!("{}d_cuboid", self.half_widths.len())
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        coord_infos(self.half_widths.len())
    }

    fn match_params(&self) -> Vec<EngineParam> {
        self.half_widths
            .iter()
            .enumerate()
            .map(|(i, &e)| {
                let name = format!("Error in {}", axis_name(i));
                EngineParam::new(TupleInfo::number(&name, "Half length of error box"), e)
            })
            .collect()
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![bin_factor_param(self.bin_factor)]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        let n = self.half_widths.len();
        let slot = self
            .half_widths
            .get_mut(index)
            .ok_or_else(|| no_such_param(&format!("{n}d_cuboid"), "match", index, n))?;
        *slot = positive(&format!("Error in {}", axis_name(index)), value)?;
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.bin_factor = positive("Bin Factor", value)?,
            _ => return Err(no_such_param(&self.name(), "tuning", index, 1)),
        }
        Ok(())
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Separation",
            "Largest per-axis distance as a fraction of the box half-width",
        ))
    }

    fn score_scale(&self) -> f64 {
        1.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        let Some(xs) = coords(tuple, self.half_widths.len()) else {
            return Ok(());
        };
        let half: Vec<f64> = self.half_widths.iter().map(|e| pad(0.5 * e)).collect();
        let cell: Vec<f64> = self.half_widths.iter().map(|e| e * self.bin_factor).collect();
        cell_bins(&xs, &half, &cell, out)
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let mut worst: f64 = 0.0;
        for (i, &h) in self.half_widths.iter().enumerate() {
            let d = (a[i].to_f64() - b[i].to_f64()).abs() / h;
            if !(d <= 1.0) {
                return None;
            }
            worst = worst.max(d);
        }
        Some(worst)
    }
}

/// Matches points closer than the sum of their per-row error radii.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCartesianEngine {
    ndim: usize,
    scale: f64,
    bin_factor: f64,
}

impl ErrorCartesianEngine {
    pub fn new(ndim: usize) -> Self {
        Self {
            ndim,
            scale: 1.0,
            bin_factor: 1.0,
        }
    }

    fn error(&self, t: &[Value]) -> Option<f64> {
        let e = t.get(self.ndim)?.to_f64();
        (e.is_finite() && e >= 0.0).then_some(e)
    }
}

impl EngineOps for ErrorCartesianEngine {
    fn name(&self) -> String {
        format!("{}d_err", self.ndim)
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        let mut infos = coord_infos(self.ndim);
        infos.push(TupleInfo::number("Error", "Per-object error radius"));
        infos
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::number(
                "Scale",
                "Rough average of per-object error distance; just used for tuning",
            ),
            self.scale,
        )]
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![bin_factor_param(self.bin_factor)]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.scale = positive("Scale", value)?,
            _ => return Err(no_such_param(&self.name(), "match", index, 1)),
        }
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.bin_factor = positive("Bin Factor", value)?,
            _ => return Err(no_such_param(&self.name(), "tuning", index, 1)),
        }
        Ok(())
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Separation",
            "Distance as a fraction of the summed errors; 1 is the largest acceptable",
        ))
    }

    fn score_scale(&self) -> f64 {
        1.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        let (Some(xs), Some(err)) = (coords(tuple, self.ndim), self.error(tuple)) else {
            return Ok(());
        };
        let half = vec![pad(err); self.ndim];
        let cell = vec![self.scale * self.bin_factor; self.ndim];
        cell_bins(&xs, &half, &cell, out)
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let err = self.error(a)? + self.error(b)?;
        let d = weighted_d2(a, b, self.ndim, |_| 1.0).sqrt();
        if !(d <= err) {
            None
        } else if err == 0.0 {
            Some(0.0)
        } else {
            Some(d / err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::reals;

    fn shares_bin(engine: &impl EngineOps, a: &[f64], b: &[f64]) -> bool {
        let (mut ba, mut bb) = (Vec::new(), Vec::new());
        engine.bins(&reals(a), &mut ba).unwrap();
        engine.bins(&reals(b), &mut bb).unwrap();
        ba.iter().any(|k| bb.contains(k))
    }

    #[test]
    fn isotropic_boundary_is_inclusive() {
        let e = IsotropicEngine::with_error(1, 0.1).unwrap();
        assert_eq!(e.score(&reals(&[0.0]), &reals(&[0.1])), Some(0.1));
        assert_eq!(e.score(&reals(&[0.0]), &reals(&[0.1 + 1e-12])), None);
        assert!(shares_bin(&e, &[0.0], &[0.1]));
        assert!(shares_bin(&e, &[0.05], &[0.15]));
    }

    #[test]
    fn isotropic_nan_never_matches() {
        let e = IsotropicEngine::with_error(2, 1.0).unwrap();
        assert_eq!(e.score(&reals(&[f64::NAN, 0.0]), &reals(&[0.0, 0.0])), None);
        let mut bins = Vec::new();
        e.bins(&reals(&[f64::NAN, 0.0]), &mut bins).unwrap();
        assert!(bins.is_empty());
    }

    #[test]
    fn anisotropic_scales_axes() {
        let mut e = AnisotropicEngine::new(2);
        e.set_match_param(0, 2.0).unwrap();
        e.set_match_param(1, 0.5).unwrap();
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[2.0, 0.0])), Some(1.0));
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[0.0, 1.0])), None);
        assert!(shares_bin(&e, &[0.0, 0.0], &[2.0, 0.0]));
        assert!(e.set_match_param(2, 1.0).is_err());
    }

    #[test]
    fn cuboid_uses_max_norm() {
        let mut e = CuboidEngine::new(2);
        e.set_match_param(0, 1.0).unwrap();
        e.set_match_param(1, 2.0).unwrap();
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[0.5, 2.0])), Some(1.0));
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[0.5, 1.0])), Some(0.5));
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[1.5, 0.0])), None);
        assert!(shares_bin(&e, &[0.0, 0.0], &[1.0, -2.0]));
    }

    #[test]
    fn error_cartesian_sums_radii() {
        let e = ErrorCartesianEngine::new(1);
        assert_eq!(e.score(&reals(&[0.0, 1.0]), &reals(&[3.0, 2.0])), Some(1.0));
        assert_eq!(e.score(&reals(&[0.0, 1.0]), &reals(&[1.5, 2.0])), Some(0.5));
        assert_eq!(e.score(&reals(&[0.0, 1.0]), &reals(&[3.5, 2.0])), None);
        assert_eq!(e.score(&reals(&[0.0, -1.0]), &reals(&[0.0, 2.0])), None);
        assert!(shares_bin(&e, &[0.0, 1.0], &[3.0, 2.0]));
    }
}
