//! Overlap scoring for error ellipses in the plane.
//!
//! The score runs from 0 (concentric) through 1 (one centre on the other's
//! boundary) to 2 (ellipses just touching):
//! * a centre inside the other ellipse scores the smaller of the two
//!   scaled centre distances;
//! * otherwise overlapping ellipses score `1 + (s1 + s2) / 2`, where `s1`
//!   and `s2` are the smallest scaled distances from each centre to the other
//!   ellipse's boundary, found numerically (or in closed form for circles).

use super::grid::cell_bins;
use super::{BinKey, EngineOps, EngineParam, no_such_param, pad, positive};
use crate::match_error::MatchError;
use crate::table::Value;
use crate::tuple::{AngleRole, TupleInfo};
use std::f64::consts::TAU;

const GRID_STEPS: usize = 72;
const GOLDEN_ITERATIONS: usize = 64;

/// Ellipse with semi-axis `a` at angle `theta` from +X towards +Y, and
/// semi-axis `b` perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub x: f64,
    pub y: f64,
    pub a: f64,
    pub b: f64,
    cos: f64,
    sin: f64,
}

#[inline]
fn ratio(d: f64, r: f64) -> f64 {
    if d == 0.0 { 0.0 } else { d / r }
}

impl Ellipse {
    /// `None` unless every value is finite and both radii are non-negative.
    pub fn new(x: f64, y: f64, a: f64, b: f64, theta: f64) -> Option<Self> {
        let ok = [x, y, a, b, theta].iter().all(|v| v.is_finite()) && a >= 0.0 && b >= 0.0;
        let (sin, cos) = theta.sin_cos();
        ok.then_some(Self { x, y, a, b, cos, sin })
    }

    pub fn max_radius(&self) -> f64 {
        self.a.max(self.b)
    }

    pub fn is_point(&self) -> bool {
        self.a == 0.0 && self.b == 0.0
    }

    pub fn is_circle(&self) -> bool {
        self.a == self.b
    }

    /// Distance of (`px`, `py`) from the centre in units of the ellipse
    /// radius along that direction; 1 on the boundary.
    pub fn scaled_distance(&self, px: f64, py: f64) -> f64 {
        let (rx, ry) = (px - self.x, py - self.y);
        let u = ratio(rx * self.cos + ry * self.sin, self.a);
        let v = ratio(-rx * self.sin + ry * self.cos, self.b);
        (u * u + v * v).sqrt()
    }

    /// Boundary point at eccentric anomaly `phi`.
    pub fn edge_point(&self, phi: f64) -> (f64, f64) {
        let (sp, cp) = phi.sin_cos();
        (
            self.x + self.a * cp * self.cos - self.b * sp * self.sin,
            self.y + self.a * cp * self.sin + self.b * sp * self.cos,
        )
    }
}

/// Smallest scaled distance, relative to `e1`, of any point on the boundary
/// of `e2`.
pub fn closest_scaled_edge(e1: &Ellipse, e2: &Ellipse) -> f64 {
    let f = |phi: f64| {
        let (px, py) = e2.edge_point(phi);
        e1.scaled_distance(px, py)
    };
    let step = TAU / GRID_STEPS as f64;
    let (mut best_phi, mut best) = (0.0, f(0.0));
    for i in 1..GRID_STEPS {
        let phi = i as f64 * step;
        let s = f(phi);
        if s < best {
            best = s;
            best_phi = phi;
        }
    }

    let inv_golden = (5f64.sqrt() - 1.0) * 0.5;
    let (mut lo, mut hi) = (best_phi - step, best_phi + step);
    let mut c = hi - inv_golden * (hi - lo);
    let mut d = lo + inv_golden * (hi - lo);
    let (mut fc, mut fd) = (f(c), f(d));
    for _ in 0..GOLDEN_ITERATIONS {
        if fc < fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - inv_golden * (hi - lo);
            fc = f(c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + inv_golden * (hi - lo);
            fd = f(d);
        }
    }
    best.min(fc).min(fd)
}

/// Overlap score of two ellipses, or `None` if they do not overlap.
pub fn ellipse_score(e1: &Ellipse, e2: &Ellipse, recognise_circles: bool) -> Option<f64> {
    let sep = (e2.x - e1.x).hypot(e2.y - e1.y);
    if !(sep <= e1.max_radius() + e2.max_radius()) {
        return None;
    }
    match (e1.is_point(), e2.is_point()) {
        (true, true) => return (sep == 0.0).then_some(0.0),
        (true, false) => {
            let s = e2.scaled_distance(e1.x, e1.y);
            return (s <= 1.0).then_some(s);
        }
        (false, true) => {
            let s = e1.scaled_distance(e2.x, e2.y);
            return (s <= 1.0).then_some(s);
        }
        (false, false) => {}
    }

    let sc1 = e1.scaled_distance(e2.x, e2.y);
    let sc2 = e2.scaled_distance(e1.x, e1.y);
    if sc1 <= 1.0 || sc2 <= 1.0 {
        return Some(sc1.min(sc2));
    }

    if recognise_circles && e1.is_circle() && e2.is_circle() {
        let (r1, r2) = (e1.a, e2.a);
        return Some(1.0 + 0.5 * ((sep - r2) / r1 + (sep - r1) / r2));
    }

    let s1 = closest_scaled_edge(e1, e2);
    let s2 = closest_scaled_edge(e2, e1);
    (s1 <= 1.0 && s2 <= 1.0).then(|| 1.0 + 0.5 * (s1 + s2))
}

/// Matches per-row error ellipses in a Cartesian plane.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipseEngine {
    scale: f64,
    bin_factor: f64,
    recognise_circles: bool,
}

impl Default for EllipseEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EllipseEngine {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            bin_factor: 1.0,
            recognise_circles: true,
        }
    }

    pub fn with_recognise_circles(mut self, recognise: bool) -> Self {
        self.recognise_circles = recognise;
        self
    }

    fn ellipse(t: &[Value]) -> Option<Ellipse> {
        match t {
            [x, y, a, b, theta, ..] => Ellipse::new(
                x.to_f64(),
                y.to_f64(),
                a.to_f64(),
                b.to_f64(),
                theta.to_f64(),
            ),
            _ => None,
        }
    }
}

impl EngineOps for EllipseEngine {
    fn name(&self) -> String {
        "2d_ellipse".to_owned()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        vec![
            TupleInfo::number("X", "Cartesian co-ordinate #1"),
            TupleInfo::number("Y", "Cartesian co-ordinate #2"),
            TupleInfo::number("Primary Radius", "Length of ellipse semi-major axis"),
            TupleInfo::number("Secondary Radius", "Length of ellipse semi-minor axis"),
            TupleInfo::angle(
                "Orientation",
                "Angle from X axis towards Y axis of semi-major axis",
                AngleRole::Position,
            ),
        ]
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::number(
                "Scale",
                "Rough average of ellipse major radius; just used for tuning",
            ),
            self.scale,
        )]
    }

    fn tuning_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::number(
                "Bin Factor",
                "Scaling factor to adjust bin size; larger values mean larger bins",
            ),
            self.bin_factor,
        )]
    }

    fn set_match_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.scale = positive("Scale", value)?,
            _ => return Err(no_such_param("2d_ellipse", "match", index, 1)),
        }
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.bin_factor = positive("Bin Factor", value)?,
            _ => return Err(no_such_param("2d_ellipse", "tuning", index, 1)),
        }
        Ok(())
    }

    fn score_info(&self) -> Option<TupleInfo> {
        Some(TupleInfo::number(
            "Separation",
            "Normalised distance between ellipses; 0 is concentric, 1 is centre on boundary, 2 is touching",
        ))
    }

    fn score_scale(&self) -> f64 {
        2.0
    }

    fn bins(&self, tuple: &[Value], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
        let Some(e) = Self::ellipse(tuple) else {
            return Ok(());
        };
        let half = pad(e.max_radius());
        let cell = self.scale * self.bin_factor;
        cell_bins(&[e.x, e.y], &[half, half], &[cell, cell], out)
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let e1 = Self::ellipse(a)?;
        let e2 = Self::ellipse(b)?;
        ellipse_score(&e1, &e2, self.recognise_circles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn el(x: f64, y: f64, a: f64, b: f64, theta: f64) -> Ellipse {
        Ellipse::new(x, y, a, b, theta).unwrap()
    }

    #[test]
    fn orientation_follows_theta() {
        let e = el(0.0, 0.0, 2.0, 1.0, FRAC_PI_2);
        assert!((e.scaled_distance(0.0, 2.0) - 1.0).abs() < 1e-12);
        assert!((e.scaled_distance(1.0, 0.0) - 1.0).abs() < 1e-12);
        let (px, py) = e.edge_point(0.0);
        assert!(px.abs() < 1e-12 && (py - 2.0).abs() < 1e-12);
    }

    #[test]
    fn centre_inside_scores_below_one() {
        let e1 = el(0.0, 0.0, 2.0, 1.0, 0.0);
        let e2 = el(1.0, 0.0, 0.1, 0.1, 0.0);
        let s = ellipse_score(&e1, &e2, true).unwrap();
        assert!((s - 0.5).abs() < 1e-12);
        assert_eq!(ellipse_score(&e2, &e1, true), Some(s));
    }

    #[test]
    fn circles_closed_form_matches_numeric() {
        let e1 = el(0.0, 0.0, 1.0, 1.0, 0.0);
        let e2 = el(1.8, 0.0, 1.0, 1.0, 0.3);
        let fast = ellipse_score(&e1, &e2, true).unwrap();
        let slow = ellipse_score(&e1, &e2, false).unwrap();
        assert!((fast - 1.8).abs() < 1e-12);
        assert!((fast - slow).abs() < 1e-6, "{fast} vs {slow}");
    }

    #[test]
    fn disjoint_ellipses_do_not_match() {
        let e1 = el(0.0, 0.0, 2.0, 0.5, 0.0);
        let e2 = el(0.0, 1.6, 2.0, 0.5, 0.0);
        assert_eq!(ellipse_score(&e1, &e2, true), None);
        let e3 = el(0.0, 0.9, 2.0, 0.5, 0.0);
        let s = ellipse_score(&e1, &e3, true).unwrap();
        assert!(s > 1.0 && s <= 2.0);
    }

    #[test]
    fn points_need_to_coincide_or_fall_inside() {
        let p = el(0.5, 0.0, 0.0, 0.0, 0.0);
        let q = el(0.5, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(ellipse_score(&p, &q, true), Some(0.0));
        let e = el(0.0, 0.0, 1.0, 1.0, 0.0);
        assert_eq!(ellipse_score(&p, &e, true), Some(0.5));
        assert_eq!(ellipse_score(&e, &p, true), Some(0.5));
    }

    #[test]
    fn engine_rejects_bad_radii() {
        let engine = EllipseEngine::new();
        let ok = [0.0, 0.0, 1.0, 1.0, 0.0].map(Value::Real);
        let bad = [0.0, 0.0, -1.0, 1.0, 0.0].map(Value::Real);
        assert_eq!(engine.score(&ok, &bad), None);
        let mut bins = Vec::new();
        engine.bins(&bad, &mut bins).unwrap();
        assert!(bins.is_empty());
        engine.bins(&ok, &mut bins).unwrap();
        assert!(!bins.is_empty());
    }
}
