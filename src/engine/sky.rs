//! Sky position engines with a fixed or per-row angular tolerance.

use super::{BinKey, EngineOps, EngineParam, no_such_param, non_negative, pad};
use crate::match_error::MatchError;
use crate::pixel::sphere::{haversine, is_sky_position};
use crate::pixel::{PixellatorKind, SkyPixellator};
use crate::table::Value;
use crate::tuple::{AngleRole, TupleInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One arcsecond in radians.
pub(crate) const ARCSEC: f64 = std::f64::consts::PI / (180.0 * 3600.0);

pub(crate) fn radec_infos() -> [TupleInfo; 2] {
    [
        TupleInfo::angle("RA", "Right Ascension", AngleRole::Position),
        TupleInfo::angle("Dec", "Declination", AngleRole::Position),
    ]
}

pub(crate) fn k_param(pix: &SkyPixellator) -> EngineParam {
    let (name, description) = pix.kind().k_param();
    EngineParam::new(TupleInfo::number(name, description), pix.k() as f64)
}

/// Append the pixel keys of a disc, if the centre is a real sky position.
pub(crate) fn disc_bins(pix: &SkyPixellator, ra: f64, dec: f64, radius: f64, out: &mut Vec<BinKey>) {
    if !is_sky_position(ra, dec) || !(radius >= 0.0) || !radius.is_finite() {
        return;
    }
    let mut pixels = Vec::new();
    pix.disc(ra, dec, radius, &mut pixels);
    out.extend(pixels.into_iter().map(BinKey::Pixel));
}

fn radec(t: &[Value]) -> Option<(f64, f64)> {
    match t {
        [ra, dec, ..] => {
            let (ra, dec) = (ra.to_f64(), dec.to_f64());
            is_sky_position(ra, dec).then_some((ra, dec))
        }
        _ => None,
    }
}

/// Matches sky positions within a fixed great-circle separation.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyEngine {
    sep: f64,
    pix: SkyPixellator,
}

impl SkyEngine {
    pub fn new(kind: PixellatorKind) -> Self {
        Self {
            sep: ARCSEC,
            pix: SkyPixellator::new(kind, ARCSEC),
        }
    }

    pub fn separation(&self) -> f64 {
        self.sep
    }

    pub fn pixellator(&self) -> &SkyPixellator {
        &self.pix
    }
}

impl EngineOps for SkyEngine {
    fn name(&self) -> String {
        "sky".to_owned()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        radec_infos().to_vec()
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::angle(
                "Max Error",
                "Maximum separation along a great circle",
                AngleRole::Size,
            ),
            self.sep,
        )]
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![k_param(&self.pix)]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => {
                self.sep = non_negative("Max Error", value)?;
                self.pix.set_scale(self.sep);
            }
            _ => return Err(no_such_param("sky", "match", index, 1)),
        }
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.pix.set_k(value),
            _ => Err(no_such_param("sky", "tuning", index, 1)),
        }
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::angle(
            "Separation",
            "Distance between matched points along a great circle",
            AngleRole::Size,
        ))
    }

    fn score_scale(&self) -> f64 {
        self.sep
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        if let Some((ra, dec)) = radec(tuple) {
            disc_bins(&self.pix, ra, dec, pad(0.5 * self.sep), out);
        }
        Ok(())
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let (ra1, dec1) = radec(a)?;
        let (ra2, dec2) = radec(b)?;
        let d = haversine(ra1, dec1, ra2, dec2);
        (d <= self.sep).then_some(d)
    }
}

/// How two per-row errors combine into a match tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSummation {
    /// `e1 + e2`.
    #[default]
    Simple,
    /// `sqrt(e1² + e2²)`.
    Quadrature,
}

impl ErrorSummation {
    #[inline]
    pub fn combine(self, e1: f64, e2: f64) -> f64 {
        match self {
            ErrorSummation::Simple => e1 + e2,
            ErrorSummation::Quadrature => e1.hypot(e2),
        }
    }
}

impl FromStr for ErrorSummation {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(ErrorSummation::Simple),
            "quadrature" => Ok(ErrorSummation::Quadrature),
            _ => Err(MatchError::Config(format!(
                "unknown error summation `{s}` (simple, quadrature)"
            ))),
        }
    }
}

impl fmt::Display for ErrorSummation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorSummation::Simple => "simple",
            ErrorSummation::Quadrature => "quadrature",
        })
    }
}

/// Matches sky positions whose separation is within the combined per-row
/// errors. The score is the separation as a fraction of that tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSkyEngine {
    scale: f64,
    summation: ErrorSummation,
    pix: SkyPixellator,
}

impl ErrorSkyEngine {
    pub fn new(kind: PixellatorKind, summation: ErrorSummation) -> Self {
        Self {
            scale: ARCSEC,
            summation,
            pix: SkyPixellator::new(kind, ARCSEC),
        }
    }

    pub fn summation(&self) -> ErrorSummation {
        self.summation
    }

    fn position(t: &[Value]) -> Option<(f64, f64, f64)> {
        let (ra, dec) = radec(t)?;
        let err = t.get(2)?.to_f64();
        (err.is_finite() && err >= 0.0).then_some((ra, dec, err))
    }
}

impl EngineOps for ErrorSkyEngine {
    fn name(&self) -> String {
        "skyerr".to_owned()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        let [ra, dec] = radec_infos();
        vec![
            ra,
            dec,
            TupleInfo::angle(
                "Error",
                "Per-object error radius along a great circle",
                AngleRole::Size,
            ),
        ]
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::angle(
                "Scale",
                "Rough average of per-object error distance; just used for tuning",
                AngleRole::Size,
            ),
            self.scale,
        )]
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![k_param(&self.pix)]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => {
                self.scale = non_negative("Scale", value)?;
                self.pix.set_scale(self.scale);
            }
            _ => return Err(no_such_param("skyerr", "match", index, 1)),
        }
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.pix.set_k(value),
            _ => Err(no_such_param("skyerr", "tuning", index, 1)),
        }
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Separation",
            "Separation as a fraction of the combined errors; 0 is coincident, 1 is at the limit",
        ))
    }

    fn score_scale(&self) -> f64 {
        1.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        if let Some((ra, dec, err)) = Self::position(tuple) {
            disc_bins(&self.pix, ra, dec, pad(err), out);
        }
        Ok(())
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let (ra1, dec1, e1) = Self::position(a)?;
        let (ra2, dec2, e2) = Self::position(b)?;
        let d = haversine(ra1, dec1, ra2, dec2);
        let tolerance = self.summation.combine(e1, e2);
        if d == 0.0 {
            Some(0.0)
        } else if d <= tolerance {
            Some(d / tolerance)
        } else {
            None
        }
    }
}
