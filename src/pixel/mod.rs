//! Sky pixellation for angular binning.
//!
//! A [`SkyPixellator`] turns a disc on the sky into the ids of every pixel
//! it touches at one resolution. Two points within `2r` of each other both
//! have discs of radius `r` containing their midpoint, so they always share
//! at least one pixel. The sky engines rely on this to bin without missing
//! matches. The resolution only trades memory against wasted comparisons;
//! it never changes which pairs match.

pub mod healpix;
pub mod htm;
pub mod sphere;

pub use healpix::Healpix;
pub use htm::Htm;

use crate::match_error::MatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Typical pixel edge as a multiple of the match scale.
pub const PIXEL_SCALE_FACTOR: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixellatorKind {
    #[default]
    Healpix,
    Htm,
}

impl PixellatorKind {
    pub fn max_k(self) -> u8 {
        match self {
            PixellatorKind::Healpix => healpix::MAX_ORDER,
            PixellatorKind::Htm => htm::MAX_LEVEL,
        }
    }

    /// Name and description of the resolution tuning parameter.
    pub fn k_param(self) -> (&'static str, &'static str) {
        match self {
            PixellatorKind::Healpix => ("HEALPix k", "Controls sky pixel size; legal range 0-24"),
            PixellatorKind::Htm => ("HTM level", "Controls sky pixel size; legal range 0-20"),
        }
    }

    /// Approximate pixel edge length (radians) at resolution `k`.
    fn edge(self, k: f64) -> f64 {
        match self {
            PixellatorKind::Healpix => (std::f64::consts::PI / 3.0).sqrt() / k.exp2(),
            PixellatorKind::Htm => std::f64::consts::FRAC_PI_2 / k.exp2(),
        }
    }

    /// Resolution whose pixel edge is about [`PIXEL_SCALE_FACTOR`] times
    /// `scale` (radians). Zero or tiny scales get the finest resolution.
    pub fn calculate_default_k(self, scale: f64) -> u8 {
        let target = PIXEL_SCALE_FACTOR * scale;
        if !(target > 0.0) || !target.is_finite() {
            return if target == f64::INFINITY { 0 } else { self.max_k() };
        }
        let k = (self.edge(0.0) / target).log2().floor();
        k.clamp(0.0, self.max_k() as f64) as u8
    }
}

impl FromStr for PixellatorKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "healpix" => Ok(PixellatorKind::Healpix),
            "htm" => Ok(PixellatorKind::Htm),
            _ => Err(MatchError::Config(format!(
                "unknown sky pixellator `{s}` (healpix, htm)"
            ))),
        }
    }
}

impl fmt::Display for PixellatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PixellatorKind::Healpix => "healpix",
            PixellatorKind::Htm => "htm",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grid {
    Healpix(Healpix),
    Htm(Htm),
}

/// Pixellator whose resolution follows a match scale unless fixed by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyPixellator {
    kind: PixellatorKind,
    grid: Grid,
    fixed: bool,
}

impl SkyPixellator {
    pub fn new(kind: PixellatorKind, scale: f64) -> Self {
        let mut p = Self {
            kind,
            grid: Self::grid(kind, 0),
            fixed: false,
        };
        p.set_scale(scale);
        p
    }

    fn grid(kind: PixellatorKind, k: u8) -> Grid {
        match kind {
            PixellatorKind::Healpix => Grid::Healpix(Healpix::new(k)),
            PixellatorKind::Htm => Grid::Htm(Htm::new(k)),
        }
    }

    pub fn kind(&self) -> PixellatorKind {
        self.kind
    }

    pub fn k(&self) -> u8 {
        match self.grid {
            Grid::Healpix(h) => h.order(),
            Grid::Htm(h) => h.level(),
        }
    }

    /// Re-derive the resolution from a new scale, unless it was fixed.
    pub fn set_scale(&mut self, scale: f64) {
        if !self.fixed {
            self.grid = Self::grid(self.kind, self.kind.calculate_default_k(scale));
        }
    }

    /// Fix the resolution; `k` must be an integer in the legal range.
    pub fn set_k(&mut self, k: f64) -> Result<(), MatchError> {
        let (name, _) = self.kind.k_param();
        if !(k.fract() == 0.0 && (0.0..=self.kind.max_k() as f64).contains(&k)) {
            return Err(MatchError::InvalidParameter {
                name: name.to_owned(),
                value: k,
                reason: "not an integer in the legal range",
            });
        }
        self.grid = Self::grid(self.kind, k as u8);
        self.fixed = true;
        Ok(())
    }

    /// Pixel containing a point.
    pub fn pixel(&self, ra: f64, dec: f64) -> u64 {
        match &self.grid {
            Grid::Healpix(h) => h.pixel(ra, dec),
            Grid::Htm(h) => h.pixel(ra, dec),
        }
    }

    /// Append the pixels touching the disc; the caller has checked the
    /// position is a valid sky position.
    pub fn disc(&self, ra: f64, dec: f64, radius: f64, out: &mut Vec<u64>) {
        match &self.grid {
            Grid::Healpix(h) => h.disc(ra, dec, radius, out),
            Grid::Htm(h) => h.disc(ra, dec, radius, out),
        }
    }
}
