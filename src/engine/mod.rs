//! Match engines: what it means for two tuples to match.
//!
//! An engine declares the shape of its tuples, scores pairs of tuples
//! (`None` for "no match", otherwise a non-negative score where lower is
//! better) and maps each tuple to a set of [`BinKey`]s. Any two tuples that
//! match must share at least one bin key, which is what lets the matcher
//! compare only rows that share a bin instead of every pair.
//!
//! The set of engines is closed: [`MatchEngine`] is an enum over the
//! concrete engine structs, each of which implements [`EngineOps`].

pub mod cartesian;
pub mod combined;
pub mod ellipse;
pub mod exact;
pub mod grid;
pub mod human;
pub mod polar;
pub mod sky;
pub mod sky_ellipse;

pub use cartesian::{AnisotropicEngine, CuboidEngine, ErrorCartesianEngine, IsotropicEngine};
pub use combined::CombinedEngine;
pub use ellipse::EllipseEngine;
pub use exact::{ExactEngine, ExactKey};
pub use human::HumanEngine;
pub use polar::PolarEngine;
pub use sky::{ErrorSkyEngine, ErrorSummation, SkyEngine};
pub use sky_ellipse::SkyEllipseEngine;

use crate::match_error::MatchError;
use crate::pixel::PixellatorKind;
use crate::table::Value;
use crate::tuple::{Tuple, TupleInfo};
use once_cell::sync::Lazy;
use static_assertions::assert_impl_all;

/// Opaque bin identifier produced by an engine from a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinKey {
    /// Sky pixel id.
    Pixel(u64),
    /// Cartesian grid cell.
    Cell(Box<[i64]>),
    /// Normalised exact value.
    Exact(ExactKey),
    /// Key from sub-engine `n` of a combined engine.
    Part(u8, Box<BinKey>),
}

impl BinKey {
    /// Index of the combined-engine part this key belongs to (0 otherwise).
    #[inline]
    pub fn part(&self) -> usize {
        match self {
            BinKey::Part(i, _) => *i as usize,
            _ => 0,
        }
    }
}

/// A named, described numeric engine parameter and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParam {
    pub info: TupleInfo,
    pub value: f64,
}

impl EngineParam {
    pub fn new(info: TupleInfo, value: f64) -> Self {
        Self { info, value }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// Operations every engine variant provides.
pub trait EngineOps {
    fn name(&self) -> String;
    fn tuple_infos(&self) -> Vec<TupleInfo>;
    /// Parameters that define what counts as a match; must be supplied.
    fn match_params(&self) -> Vec<EngineParam>;
    /// Parameters that only affect performance; defaults are sensible.
    fn tuning_params(&self) -> Vec<EngineParam>;
    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError>;
    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError>;
    /// Description of the score, or `None` if it carries no information.
    fn score_info(&self) -> Option<TupleInfo>;
    /// Rough size of a typical score, used to normalise combined scores.
    fn score_scale(&self) -> f64;
    /// Append the bin keys for `tuple`; invalid tuples get none.
    ///
    /// Fails with [`MatchError::ResourceExhausted`] when one tuple would
    /// need an unreasonable number of bins.
    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError>;
    /// Symmetric match score; `None` means no match.
    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64>;
}

/// Closed set of match engines.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEngine {
    Exact(ExactEngine),
    Isotropic(IsotropicEngine),
    Anisotropic(AnisotropicEngine),
    Cuboid(CuboidEngine),
    ErrorCartesian(ErrorCartesianEngine),
    Ellipse(EllipseEngine),
    Sky(SkyEngine),
    ErrorSky(ErrorSkyEngine),
    SkyEllipse(SkyEllipseEngine),
    SphericalPolar(PolarEngine),
    Combined(CombinedEngine),
    Human(HumanEngine),
}

assert_impl_all!(MatchEngine: Send, Sync, Clone);
assert_impl_all!(BinKey: Send, Sync, Ord, std::hash::Hash);

macro_rules! dispatch {
    ($self:expr, $e:ident => $body:expr) => {
        match $self {
            MatchEngine::Exact($e) => $body,
            MatchEngine::Isotropic($e) => $body,
            MatchEngine::Anisotropic($e) => $body,
            MatchEngine::Cuboid($e) => $body,
            MatchEngine::ErrorCartesian($e) => $body,
            MatchEngine::Ellipse($e) => $body,
            MatchEngine::Sky($e) => $body,
            MatchEngine::ErrorSky($e) => $body,
            MatchEngine::SkyEllipse($e) => $body,
            MatchEngine::SphericalPolar($e) => $body,
            MatchEngine::Combined($e) => $body,
            MatchEngine::Human($e) => $body,
        }
    };
}

impl EngineOps for MatchEngine {
    fn name(&self) -> String {
        dispatch!(self, e => e.name())
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        dispatch!(self, e => e.tuple_infos())
    }

    fn match_params(&self) -> Vec<EngineParam> {
        dispatch!(self, e => e.match_params())
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        dispatch!(self, e => e.tuning_params())
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        dispatch!(self, e => e.set_match_param(index, value))
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        dispatch!(self, e => e.set_tuning_param(index, value))
    }

    fn score_info(&self) -> Option<TupleInfo> {
        dispatch!(self, e => e.score_info())
    }

    fn score_scale(&self) -> f64 {
        dispatch!(self, e => e.score_scale())
    }

    #[inline]
    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        dispatch!(self, e => e.bins(tuple, out))
    }

    #[inline]
    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        dispatch!(self, e => e.score(a, b))
    }
}

/// Registry entry for a selectable engine name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEntry {
    pub name: &'static str,
    pub description: &'static str,
}

static KNOWN_ENGINES: Lazy<Vec<EngineEntry>> = Lazy::new(|| {
    [
        ("sky", "Sky position within a fixed angular separation"),
        ("skyerr", "Sky position within the sum of per-row error radii"),
        ("skyellipse", "Overlap of per-row error ellipses on the sky"),
        ("sky3d", "Sky position plus distance, within a fixed spatial separation"),
        ("exact", "Exact equality of a key value"),
        ("Nd", "N-dimensional Cartesian, within a fixed isotropic distance (1d, 2d, ...)"),
        ("Nd_anisotropic", "N-dimensional Cartesian within a per-axis error ellipsoid"),
        ("Nd_cuboid", "N-dimensional Cartesian within a per-axis error cuboid"),
        ("Nd_err", "N-dimensional Cartesian within the sum of per-row error radii"),
        ("2d_ellipse", "Overlap of per-row error ellipses in the plane"),
    ]
    .into_iter()
    .map(|(name, description)| EngineEntry { name, description })
    .collect()
});

/// Engine names accepted by [`MatchEngine::parse`]; `N` stands for a dimension count.
pub fn known_engines() -> &'static [EngineEntry] {
    &KNOWN_ENGINES
}

fn unknown_engine(name: &str) -> MatchError {
    MatchError::UnknownEngine {
        name: name.to_owned(),
        known: known_engines()
            .iter()
            .map(|e| e.name)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Split `"3d_cuboid"` into `(3, "_cuboid")`.
fn split_dimension(name: &str) -> Option<(usize, &str)> {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    let rest = name[digits..].strip_prefix('d')?;
    let ndim: usize = name[..digits].parse().ok()?;
    (ndim > 0).then_some((ndim, rest))
}

impl MatchEngine {
    /// Engine for a single (non-combined) name, in native units.
    pub fn from_name(name: &str, pixellator: PixellatorKind) -> Result<Self, MatchError> {
        let lower = name.trim().to_ascii_lowercase();
        let engine = match lower.as_str() {
            "exact" => MatchEngine::Exact(ExactEngine),
            "sky" => MatchEngine::Sky(SkyEngine::new(pixellator)),
            "skyerr" => MatchEngine::ErrorSky(ErrorSkyEngine::new(pixellator, ErrorSummation::Simple)),
            "skyellipse" => MatchEngine::SkyEllipse(SkyEllipseEngine::new(pixellator)),
            "sky3d" => MatchEngine::SphericalPolar(PolarEngine::new()),
            "2d_ellipse" => MatchEngine::Ellipse(EllipseEngine::new()),
            other => match split_dimension(other) {
                Some((n, "")) => MatchEngine::Isotropic(IsotropicEngine::new(n)),
                Some((n, "_anisotropic")) => MatchEngine::Anisotropic(AnisotropicEngine::new(n)),
                Some((n, "_cuboid")) => MatchEngine::Cuboid(CuboidEngine::new(n)),
                Some((n, "_err")) => MatchEngine::ErrorCartesian(ErrorCartesianEngine::new(n)),
                _ => return Err(unknown_engine(name)),
            },
        };
        Ok(engine)
    }

    /// Engine for a selector such as `"sky"` or `"sky+1d"`, optionally
    /// wrapped to work in human units (degrees and arcseconds).
    pub fn parse(selector: &str, pixellator: PixellatorKind, human: bool) -> Result<Self, MatchError> {
        let mut parts = selector
            .split('+')
            .map(|name| {
                if name.trim().is_empty() {
                    Err(unknown_engine(selector))
                } else {
                    MatchEngine::from_name(name, pixellator)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let engine = if parts.len() == 1 {
            parts.remove(0)
        } else {
            MatchEngine::Combined(CombinedEngine::new(parts)?)
        };
        Ok(if human {
            MatchEngine::Human(HumanEngine::new(engine))
        } else {
            engine
        })
    }

    /// Set all match parameters and, optionally, all tuning parameters.
    pub fn configure(mut self, match_values: &[f64], tuning_values: &[f64]) -> Result<Self, MatchError> {
        let nmatch = self.match_params().len();
        if match_values.len() != nmatch {
            return Err(MatchError::ParameterCount {
                engine: self.name(),
                kind: "match",
                expected: nmatch,
                found: match_values.len(),
            });
        }
        let ntune = self.tuning_params().len();
        if !tuning_values.is_empty() && tuning_values.len() != ntune {
            return Err(MatchError::ParameterCount {
                engine: self.name(),
                kind: "tuning",
                expected: ntune,
                found: tuning_values.len(),
            });
        }
        for (i, &v) in match_values.iter().enumerate() {
            self.set_match_param(i, v)?;
        }
        for (i, &v) in tuning_values.iter().enumerate() {
            self.set_tuning_param(i, v)?;
        }
        Ok(self)
    }

    /// Number of independent bin-key families; a candidate pair must share
    /// a key in every one of them.
    pub fn bin_parts(&self) -> usize {
        match self {
            MatchEngine::Combined(c) => c.len(),
            MatchEngine::Human(h) => h.inner().bin_parts(),
            _ => 1,
        }
    }

    /// Convert raw extracted values (in the units [`tuple_infos`] declares)
    /// into the tuple the engine bins and scores.
    ///
    /// [`tuple_infos`]: EngineOps::tuple_infos
    pub fn prepare(&self, values: Vec<Value>) -> Tuple {
        match self {
            MatchEngine::Human(h) => h.to_native(values),
            _ => Tuple::new(values),
        }
    }

    /// One-line summary of the engine and its current parameters.
    pub fn describe(&self) -> String {
        let params = self
            .match_params()
            .into_iter()
            .chain(self.tuning_params())
            .map(|p| format!("{}={}", p.name(), p.value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} [{}]", self.name(), params)
    }
}

/// Parameter value check for tolerances that may be zero.
pub(crate) fn non_negative(name: &str, value: f64) -> Result<f64, MatchError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(MatchError::InvalidParameter {
            name: name.to_owned(),
            value,
            reason: "must be a finite non-negative number",
        })
    }
}

/// Parameter value check for sizes that define grid cells.
pub(crate) fn positive(name: &str, value: f64) -> Result<f64, MatchError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MatchError::InvalidParameter {
            name: name.to_owned(),
            value,
            reason: "must be a finite positive number",
        })
    }
}

pub(crate) fn no_such_param(engine: &str, kind: &'static str, index: usize, count: usize) -> MatchError {
    MatchError::ParameterCount {
        engine: engine.to_owned(),
        kind,
        expected: count,
        found: index + 1,
    }
}

/// Conventional names for the first few Cartesian axes.
pub(crate) fn axis_name(i: usize) -> String {
    match i {
        0 => "X".to_owned(),
        1 => "Y".to_owned(),
        2 => "Z".to_owned(),
        _ => format!("Co-ord #{}", i + 1),
    }
}

/// Relative padding applied to bin half-widths so that a point sitting
/// exactly on a tolerance boundary still lands in a shared bin.
pub(crate) fn pad(half_width: f64) -> f64 {
    half_width * (1.0 + 1e-9) + f64::MIN_POSITIVE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::reals;

    #[test]
    fn names_resolve() {
        let pk = PixellatorKind::Healpix;
        assert!(matches!(MatchEngine::from_name("SKY", pk), Ok(MatchEngine::Sky(_))));
        assert!(matches!(MatchEngine::from_name("3d", pk), Ok(MatchEngine::Isotropic(_))));
        assert!(matches!(
            MatchEngine::from_name("2d_anisotropic", pk),
            Ok(MatchEngine::Anisotropic(_))
        ));
        assert!(matches!(MatchEngine::from_name("1d_err", pk), Ok(MatchEngine::ErrorCartesian(_))));
        for bad in ["0d", "d", "2d_round", "skies", ""] {
            let err = MatchEngine::from_name(bad, pk).unwrap_err();
            assert!(matches!(err, MatchError::UnknownEngine { .. }), "{bad}");
        }
    }

    #[test]
    fn combined_selector() {
        let e = MatchEngine::parse("sky+exact", PixellatorKind::Healpix, false).unwrap();
        assert_eq!(e.name(), "sky+exact");
        assert_eq!(e.tuple_infos().len(), 3);
        assert_eq!(e.bin_parts(), 2);
        assert!(MatchEngine::parse("sky++exact", PixellatorKind::Healpix, false).is_err());
    }

    #[test]
    fn configure_checks_counts_and_values() {
        let e = MatchEngine::parse("2d", PixellatorKind::Healpix, false).unwrap();
        let err = e.clone().configure(&[], &[]).unwrap_err();
        assert!(matches!(err, MatchError::ParameterCount { kind: "match", .. }));
        let err = e.clone().configure(&[-1.0], &[]).unwrap_err();
        assert!(matches!(err, MatchError::InvalidParameter { .. }));
        let err = e.clone().configure(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, MatchError::ParameterCount { kind: "tuning", .. }));
        let e = e.configure(&[5.0], &[2.0]).unwrap();
        assert_eq!(e.match_params()[0].value, 5.0);
        assert_eq!(e.tuning_params()[0].value, 2.0);
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[3.0, 4.0])), Some(5.0));
        assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[3.0, 4.1])), None);
    }

    #[test]
    fn registry_lists_sky() {
        assert!(known_engines().iter().any(|e| e.name == "sky"));
        let err = MatchEngine::from_name("nope", PixellatorKind::Healpix).unwrap_err();
        assert!(err.to_string().contains("skyellipse"));
    }
}
