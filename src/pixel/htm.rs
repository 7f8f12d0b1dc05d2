//! Hierarchical Triangular Mesh pixellation.
//!
//! The sphere starts as eight octant triangles (ids 8..=15) and each level
//! splits every triangle into four at its edge midpoints, so a trixel at
//! level `l` has an id in `[8 * 4^l, 16 * 4^l)`.

use super::sphere::{Vec3, angle_between, cross, dot, normalize, radec_to_xyz};
use std::f64::consts::PI;

pub const MAX_LEVEL: u8 = 20;

const SLACK: f64 = 1e-10;

const V: [Vec3; 6] = [
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, -1.0],
];

// S0..S3, N0..N3, counter-clockwise seen from outside.
const BASE: [(u64, [usize; 3]); 8] = [
    (8, [1, 5, 2]),
    (9, [2, 5, 3]),
    (10, [3, 5, 4]),
    (11, [4, 5, 1]),
    (12, [1, 0, 4]),
    (13, [4, 0, 3]),
    (14, [3, 0, 2]),
    (15, [2, 0, 1]),
];

type Tri = [Vec3; 3];

fn midpoint(a: &Vec3, b: &Vec3) -> Vec3 {
    normalize(&[a[0] + b[0], a[1] + b[1], a[2] + b[2]])
}

fn children(t: &Tri) -> [Tri; 4] {
    let [v0, v1, v2] = t;
    let w0 = midpoint(v1, v2);
    let w1 = midpoint(v0, v2);
    let w2 = midpoint(v0, v1);
    [
        [*v0, w2, w1],
        [*v1, w0, w2],
        [*v2, w1, w0],
        [w0, w1, w2],
    ]
}

/// How far inside `t` the point lies: non-negative iff it is inside.
fn insideness(t: &Tri, p: &Vec3) -> f64 {
    let a = dot(&cross(&t[0], &t[1]), p);
    let b = dot(&cross(&t[1], &t[2]), p);
    let c = dot(&cross(&t[2], &t[0]), p);
    a.min(b).min(c)
}

fn bounding_cap(t: &Tri) -> (Vec3, f64) {
    let c = normalize(&[
        t[0][0] + t[1][0] + t[2][0],
        t[0][1] + t[1][1] + t[2][1],
        t[0][2] + t[1][2] + t[2][2],
    ]);
    let r = t
        .iter()
        .map(|v| angle_between(&c, v))
        .fold(0.0, f64::max);
    (c, r)
}

fn base_tri(corners: &[usize; 3]) -> Tri {
    [V[corners[0]], V[corners[1]], V[corners[2]]]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Htm {
    level: u8,
}

impl Htm {
    pub fn new(level: u8) -> Self {
        Self {
            level: level.min(MAX_LEVEL),
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Trixel containing the position (radians). Points on a shared edge go
    /// to whichever neighbour they are most inside.
    pub fn pixel(&self, ra: f64, dec: f64) -> u64 {
        let p = radec_to_xyz(ra, dec);
        let (mut id, mut tri) = BASE
            .iter()
            .map(|(id, corners)| (*id, base_tri(corners)))
            .max_by(|a, b| insideness(&a.1, &p).total_cmp(&insideness(&b.1, &p)))
            .unwrap_or((8, base_tri(&BASE[0].1)));
        for _ in 0..self.level {
            let kids = children(&tri);
            let (ic, best) = kids
                .iter()
                .enumerate()
                .max_by(|a, b| insideness(a.1, &p).total_cmp(&insideness(b.1, &p)))
                .map(|(i, t)| (i as u64, *t))
                .unwrap_or((0, kids[0]));
            id = id * 4 + ic;
            tri = best;
        }
        id
    }

    /// Append every trixel that intersects the disc of `radius` about
    /// (`ra`, `dec`), in ascending id order.
    pub fn disc(&self, ra: f64, dec: f64, radius: f64, out: &mut Vec<u64>) {
        let q = radec_to_xyz(ra, dec);
        let radius = radius.max(0.0).min(PI);
        let mut stack: Vec<(u8, u64, Tri)> = BASE
            .iter()
            .rev()
            .map(|(id, corners)| (0, *id, base_tri(corners)))
            .collect();
        while let Some((level, id, tri)) = stack.pop() {
            let (c, r) = bounding_cap(&tri);
            if angle_between(&c, &q) > radius + r + SLACK {
                continue;
            }
            if level == self.level {
                out.push(id);
            } else {
                let kids = children(&tri);
                for (ic, kid) in kids.iter().enumerate().rev() {
                    stack.push((level + 1, id * 4 + ic as u64, *kid));
                }
            }
        }
    }
}
