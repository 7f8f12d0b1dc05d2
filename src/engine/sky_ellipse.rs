//! Overlap scoring for error ellipses on the celestial sphere.
//!
//! Scores mean the same as for [`EllipseEngine`](super::EllipseEngine).
//! Centre-in-ellipse tests use exact spherical distances. The boundary
//! search for partially overlapping ellipses runs in a gnomonic projection
//! about the midpoint of the two centres.

use super::ellipse::{Ellipse, closest_scaled_edge};
use super::sky::{ARCSEC, disc_bins, k_param, radec_infos};
use super::{BinKey, EngineOps, EngineParam, no_such_param, non_negative, pad};
use crate::match_error::MatchError;
use crate::pixel::sphere::{Vec3, angle_between, dot, is_sky_position, norm, normalize, radec_to_xyz};
use crate::pixel::{PixellatorKind, SkyPixellator};
use crate::table::Value;
use crate::tuple::{AngleRole, TupleInfo};

#[inline]
fn ratio(d: f64, r: f64) -> f64 {
    if d == 0.0 { 0.0 } else { d / r }
}

/// Unit vector plus local north and east at a sky position.
fn frame(ra: f64, dec: f64) -> (Vec3, Vec3, Vec3) {
    let (sd, cd) = dec.sin_cos();
    let (sa, ca) = ra.sin_cos();
    let p = radec_to_xyz(ra, dec);
    let north = [-sd * ca, -sd * sa, cd];
    let east = [-sa, ca, 0.0];
    (p, north, east)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SkyEllipse {
    p: Vec3,
    major: Vec3,
    minor: Vec3,
    mu: f64,
    nu: f64,
}

impl SkyEllipse {
    fn from_tuple(t: &[Value]) -> Option<Self> {
        let [ra, dec, mu, nu, zeta] = match t {
            [a, b, c, d, e, ..] => [a, b, c, d, e].map(Value::to_f64),
            _ => return None,
        };
        let ok = is_sky_position(ra, dec)
            && [mu, nu, zeta].iter().all(|v| v.is_finite())
            && mu >= 0.0
            && nu >= 0.0;
        if !ok {
            return None;
        }
        let (p, n, e) = frame(ra, dec);
        let (sz, cz) = zeta.sin_cos();
        let major = [0, 1, 2].map(|i| n[i] * cz + e[i] * sz);
        let minor = [0, 1, 2].map(|i| -n[i] * sz + e[i] * cz);
        Some(Self { p, major, minor, mu, nu })
    }

    fn max_radius(&self) -> f64 {
        self.mu.max(self.nu)
    }

    fn is_point(&self) -> bool {
        self.mu == 0.0 && self.nu == 0.0
    }

    fn is_circle(&self) -> bool {
        self.mu == self.nu
    }

    /// Angular offset of `q` along each axis, in units of that axis' radius.
    fn scaled_distance(&self, q: &Vec3) -> f64 {
        let qp = dot(q, &self.p);
        let dm = dot(q, &self.major).abs().atan2(qp);
        let dn = dot(q, &self.minor).abs().atan2(qp);
        let (u, v) = (ratio(dm, self.mu), ratio(dn, self.nu));
        (u * u + v * v).sqrt()
    }

    /// Planar ellipse in the gnomonic projection about tangent point `t`.
    fn project(&self, t: &Vec3, north: &Vec3, east: &Vec3) -> Option<Ellipse> {
        let pt = dot(&self.p, t);
        if !(pt > 0.0) {
            return None;
        }
        let (pe, pn) = (dot(&self.p, east), dot(&self.p, north));
        let ut = dot(&self.major, t);
        let dx = dot(&self.major, east) * pt - pe * ut;
        let dy = dot(&self.major, north) * pt - pn * ut;
        Ellipse::new(pe / pt, pn / pt, self.mu, self.nu, dy.atan2(dx))
    }
}

fn sky_ellipse_score(e1: &SkyEllipse, e2: &SkyEllipse, recognise_circles: bool) -> Option<f64> {
    let sep = angle_between(&e1.p, &e2.p);
    if !(sep <= e1.max_radius() + e2.max_radius()) {
        return None;
    }
    match (e1.is_point(), e2.is_point()) {
        (true, true) => return (sep == 0.0).then_some(0.0),
        (true, false) => {
            let s = e2.scaled_distance(&e1.p);
            return (s <= 1.0).then_some(s);
        }
        (false, true) => {
            let s = e1.scaled_distance(&e2.p);
            return (s <= 1.0).then_some(s);
        }
        (false, false) => {}
    }

    let sc1 = e1.scaled_distance(&e2.p);
    let sc2 = e2.scaled_distance(&e1.p);
    if sc1 <= 1.0 || sc2 <= 1.0 {
        return Some(sc1.min(sc2));
    }

    if recognise_circles && e1.is_circle() && e2.is_circle() {
        let (r1, r2) = (e1.mu, e2.mu);
        return Some(1.0 + 0.5 * ((sep - r2) / r1 + (sep - r1) / r2));
    }

    let mid = [0, 1, 2].map(|i| e1.p[i] + e2.p[i]);
    if !(norm(&mid) > 0.0) {
        return None;
    }
    let t = normalize(&mid);
    let (ra_t, dec_t) = (t[1].atan2(t[0]), t[2].clamp(-1.0, 1.0).asin());
    let (_, north, east) = frame(ra_t, dec_t);
    let pe1 = e1.project(&t, &north, &east)?;
    let pe2 = e2.project(&t, &north, &east)?;
    let s1 = closest_scaled_edge(&pe1, &pe2);
    let s2 = closest_scaled_edge(&pe2, &pe1);
    (s1 <= 1.0 && s2 <= 1.0).then(|| 1.0 + 0.5 * (s1 + s2))
}

/// Matches per-row error ellipses on the sky.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyEllipseEngine {
    scale: f64,
    recognise_circles: bool,
    pix: SkyPixellator,
}

impl SkyEllipseEngine {
    pub fn new(kind: PixellatorKind) -> Self {
        Self {
            scale: ARCSEC,
            recognise_circles: true,
            pix: SkyPixellator::new(kind, ARCSEC),
        }
    }

    pub fn with_recognise_circles(mut self, recognise: bool) -> Self {
        self.recognise_circles = recognise;
        self
    }
}

impl EngineOps for SkyEllipseEngine {
    fn name(&self) -> String {
        "skyellipse".to_owned()
    }

    fn tuple_infos(&self) -> Vec<TupleInfo> {
        let [ra, dec] = radec_infos();
        vec![
            ra,
            dec,
            TupleInfo::angle("Primary Radius", "Length of ellipse semi-major axis", AngleRole::Size),
            TupleInfo::angle("Secondary Radius", "Length of ellipse semi-minor axis", AngleRole::Size),
            TupleInfo::angle(
                "Position Angle",
                "Angle from north pole through east to the semi-major axis",
                AngleRole::Position,
            ),
        ]
    }

    fn match_params(&self) -> Vec<EngineParam> {
        vec![EngineParam::new(
            TupleInfo::angle(
                "Scale",
                "Rough average of ellipse major radius; just used for tuning",
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
            _ => return Err(no_such_param("skyellipse", "match", index, 1)),
        }
        Ok(())
    }

    fn set_tuning_param(&mut self, index: usize, value: f64) -> Result<(), MatchError> {
        match index {
            0 => self.pix.set_k(value),
            _ => Err(no_such_param("skyellipse", "tuning", index, 1)),
        }
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
        if let Some(e) = SkyEllipse::from_tuple(tuple) {
            let (ra, dec) = (tuple[0].to_f64(), tuple[1].to_f64());
            disc_bins(&self.pix, ra, dec, pad(e.max_radius()), out);
        }
        Ok(())
    }

    fn score(&self, a: &[Value], b: &[Value]) -> Option<f64> {
        let e1 = SkyEllipse::from_tuple(a)?;
        let e2 = SkyEllipse::from_tuple(b)?;
        sky_ellipse_score(&e1, &e2, self.recognise_circles)
    }
}
