//! HEALPix pixellation, NESTED numbering.
//!
//! Point location follows the standard `loc2pix` construction. Disc queries
//! descend the pixel hierarchy from the twelve base pixels, keeping every
//! pixel whose bounding cap (centre plus a padded maximum radius sampled on
//! its boundary) touches the disc. The result may include a few pixels that
//! only graze the disc, but never misses one that intersects it.

use super::sphere::{Vec3, angle_between, radec_to_xyz};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Highest supported order; nside = 2^24.
pub const MAX_ORDER: u8 = 24;

const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

// Boundary samples per edge when bounding a pixel.
const EDGE_SAMPLES: [f64; 3] = [0.0, 0.5, 1.0];
const PIXRAD_PAD: f64 = 1.1;
const SLACK: f64 = 1e-10;

#[inline]
fn spread_bits(v: u64) -> u64 {
    let mut v = v & 0xFFFF_FFFF;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    (v | (v << 1)) & 0x5555_5555_5555_5555
}

#[inline]
fn compress_bits(v: u64) -> u64 {
    let mut v = v & 0x5555_5555_5555_5555;
    v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
    v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF;
    (v | (v >> 16)) & 0xFFFF_FFFF
}

/// HEALPix grid of a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Healpix {
    order: u8,
}

impl Healpix {
    pub fn new(order: u8) -> Self {
        Self {
            order: order.min(MAX_ORDER),
        }
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn nside(&self) -> u64 {
        1 << self.order
    }

    pub fn npix(&self) -> u64 {
        12 << (2 * self.order)
    }

    fn xyf_to_nest(order: u8, ix: u64, iy: u64, face: u64) -> u64 {
        (face << (2 * order)) + spread_bits(ix) + (spread_bits(iy) << 1)
    }

    fn nest_to_xyf(order: u8, pix: u64) -> (u64, u64, usize) {
        let face = (pix >> (2 * order)) as usize;
        let ipf = pix & ((1u64 << (2 * order)) - 1);
        (compress_bits(ipf), compress_bits(ipf >> 1), face)
    }

    /// Pixel containing the position (radians).
    pub fn pixel(&self, ra: f64, dec: f64) -> u64 {
        let order = self.order;
        let nside = self.nside() as i64;
        let z = dec.sin();
        let za = z.abs();
        let tt = (ra.rem_euclid(TAU) / FRAC_PI_2).rem_euclid(4.0);

        if za <= 2.0 / 3.0 {
            let temp1 = nside as f64 * (0.5 + tt);
            let temp2 = nside as f64 * (z * 0.75);
            let jp = (temp1 - temp2) as i64;
            let jm = (temp1 + temp2) as i64;
            let ifp = jp >> order;
            let ifm = jm >> order;
            let face = if ifp == ifm {
                ifp | 4
            } else if ifp < ifm {
                ifp
            } else {
                ifm + 8
            };
            let ix = jm & (nside - 1);
            let iy = nside - (jp & (nside - 1)) - 1;
            Self::xyf_to_nest(order, ix as u64, iy as u64, face as u64)
        } else {
            let ntt = (tt as i64).min(3);
            let tp = tt - ntt as f64;
            // 1 - |sin dec| written via cos dec to keep precision near the poles
            let tmp = nside as f64 * dec.cos().abs() * (3.0 / (1.0 + za)).sqrt();
            let jp = ((tp * tmp) as i64).min(nside - 1);
            let jm = (((1.0 - tp) * tmp) as i64).min(nside - 1);
            if z >= 0.0 {
                Self::xyf_to_nest(order, (nside - jm - 1) as u64, (nside - jp - 1) as u64, ntt as u64)
            } else {
                Self::xyf_to_nest(order, jp as u64, jm as u64, (ntt + 8) as u64)
            }
        }
    }

    /// Unit vector for face-relative coordinates `x`, `y` in `[0, 1]`.
    fn xyf_to_vec(x: f64, y: f64, face: usize) -> Vec3 {
        let jr = JRLL[face] as f64 - x - y;
        let (nr, z) = if jr < 1.0 {
            (jr, 1.0 - jr * jr / 3.0)
        } else if jr > 3.0 {
            let nr = 4.0 - jr;
            (nr, nr * nr / 3.0 - 1.0)
        } else {
            (1.0, (2.0 - jr) * 2.0 / 3.0)
        };
        let mut tmp = JPLL[face] as f64 * nr + x - y;
        if tmp < 0.0 {
            tmp += 8.0;
        }
        if tmp >= 8.0 {
            tmp -= 8.0;
        }
        let phi = if nr < 1e-15 {
            0.0
        } else {
            0.5 * FRAC_PI_2 * tmp / nr
        };
        let sth = (1.0 - z * z).max(0.0).sqrt();
        [sth * phi.cos(), sth * phi.sin(), z]
    }

    fn pixel_vec(order: u8, pix: u64, dx: f64, dy: f64) -> Vec3 {
        let (ix, iy, face) = Self::nest_to_xyf(order, pix);
        let ns = (1u64 << order) as f64;
        Self::xyf_to_vec((ix as f64 + dx) / ns, (iy as f64 + dy) / ns, face)
    }

    /// Centre of a pixel as (ra, dec) in radians.
    pub fn center(&self, pix: u64) -> (f64, f64) {
        let v = Self::pixel_vec(self.order, pix, 0.5, 0.5);
        let ra = v[1].atan2(v[0]).rem_euclid(TAU);
        (ra, v[2].clamp(-1.0, 1.0).asin())
    }

    /// Centre and padded bounding radius of pixel `pix` at `order`.
    fn bounding_cap(order: u8, pix: u64) -> (Vec3, f64) {
        let centre = Self::pixel_vec(order, pix, 0.5, 0.5);
        let mut rad: f64 = 0.0;
        for &s in &EDGE_SAMPLES {
            for (dx, dy) in [(s, 0.0), (s, 1.0), (0.0, s), (1.0, s)] {
                let edge = Self::pixel_vec(order, pix, dx, dy);
                rad = rad.max(angle_between(&centre, &edge));
            }
        }
        (centre, rad * PIXRAD_PAD + SLACK)
    }

    /// Append every pixel that intersects the disc of `radius` about
    /// (`ra`, `dec`). Pixels come out in ascending order.
    pub fn disc(&self, ra: f64, dec: f64, radius: f64, out: &mut Vec<u64>) {
        let q = radec_to_xyz(ra, dec);
        let radius = radius.max(0.0);
        if radius >= PI {
            out.extend(0..self.npix());
            return;
        }
        let mut stack: Vec<(u8, u64)> = (0..12u64).rev().map(|p| (0, p)).collect();
        while let Some((order, pix)) = stack.pop() {
            let (centre, pixrad) = Self::bounding_cap(order, pix);
            if angle_between(&centre, &q) > radius + pixrad {
                continue;
            }
            if order == self.order {
                out.push(pix);
            } else {
                stack.extend((0..4u64).rev().map(|c| (order + 1, pix * 4 + c)));
            }
        }
    }
}
