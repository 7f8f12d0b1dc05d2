//! Unit-sphere vector helpers shared by the pixellators and sky engines.

use std::f64::consts::FRAC_PI_2;

pub type Vec3 = [f64; 3];

#[inline]
pub fn radec_to_xyz(ra: f64, dec: f64) -> Vec3 {
    let (sd, cd) = dec.sin_cos();
    let (sa, ca) = ra.sin_cos();
    [cd * ca, cd * sa, sd]
}

#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

pub fn normalize(a: &Vec3) -> Vec3 {
    let n = norm(a);
    [a[0] / n, a[1] / n, a[2] / n]
}

/// Angle between two unit vectors, accurate at all separations.
#[inline]
pub fn angle_between(a: &Vec3, b: &Vec3) -> f64 {
    norm(&cross(a, b)).atan2(dot(a, b))
}

/// Great-circle separation by the haversine formula.
///
/// Symmetric in its two positions to the last bit.
pub fn haversine(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let sd = ((dec2 - dec1) * 0.5).sin();
    let sa = ((ra2 - ra1) * 0.5).sin();
    let h = sd * sd + (dec1.cos() * dec2.cos()) * (sa * sa);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Finite right ascension and declination within the poles.
#[inline]
pub fn is_sky_position(ra: f64, dec: f64) -> bool {
    ra.is_finite() && dec.is_finite() && (-FRAC_PI_2..=FRAC_PI_2).contains(&dec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn haversine_agrees_with_vectors() {
        let pairs = [
            (0.1, 0.2, 0.15, 0.25),
            (0.0, -1.5, PI, -1.5),
            (6.2, 0.0, 0.05, 0.01),
            (1.0, 1.0, 1.0 + PI, -1.0),
        ];
        for (ra1, de1, ra2, de2) in pairs {
            let h = haversine(ra1, de1, ra2, de2);
            let v = angle_between(&radec_to_xyz(ra1, de1), &radec_to_xyz(ra2, de2));
            assert!((h - v).abs() < 1e-12, "{h} vs {v}");
            assert_eq!(h, haversine(ra2, de2, ra1, de1));
        }
    }

    #[test]
    fn sky_position_checks() {
        assert!(is_sky_position(7.0, FRAC_PI_2));
        assert!(!is_sky_position(0.0, 1.6));
        assert!(!is_sky_position(f64::NAN, 0.0));
        assert!(!is_sky_position(f64::INFINITY, 0.0));
    }
}
