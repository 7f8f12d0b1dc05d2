#![allow(dead_code)]
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use table_xmatch::prelude::*;

/// Table with an integer `id` (1-based) and a real `x` column.
pub fn xs_table(name: &str, xs: &[f64]) -> Table {
    Table::from_rows(
        name,
        vec![
            ColumnInfo::new("id", ValueKind::Number),
            ColumnInfo::new("x", ValueKind::Number),
        ],
        xs.iter()
            .enumerate()
            .map(|(i, &x)| vec![Value::Int(i as i64 + 1), Value::Real(x)]),
    )
    .unwrap()
}

/// Sky catalogue columns: `id`, `ra`, `dec` (degrees).
pub fn sky_table(name: &str, positions: &[(f64, f64)]) -> Table {
    Table::from_rows(
        name,
        vec![
            ColumnInfo::new("id", ValueKind::Number),
            ColumnInfo::new("ra", ValueKind::Number).with_unit("deg"),
            ColumnInfo::new("dec", ValueKind::Number).with_unit("deg"),
        ],
        positions
            .iter()
            .enumerate()
            .map(|(i, &(ra, dec))| vec![Value::Int(i as i64 + 1), Value::Real(ra), Value::Real(dec)]),
    )
    .unwrap()
}

/// `n` random positions in a half-degree patch near (10, 0) degrees.
pub fn random_patch(n: usize, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (10.0 + rng.gen_range(0.0..0.5), rng.gen_range(-0.25..0.25)))
        .collect()
}

/// Copy of `base` where each position survives with probability `keep`,
/// moved by up to `jitter_arcsec` in each coordinate, plus `extra` new
/// random positions.
pub fn perturbed(base: &[(f64, f64)], keep: f64, jitter_arcsec: f64, extra: usize, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let j = jitter_arcsec / 3600.0;
    let mut out: Vec<(f64, f64)> = base
        .iter()
        .filter_map(|&(ra, dec)| {
            rng.gen_bool(keep)
                .then(|| (ra + rng.gen_range(-j..=j), dec + rng.gen_range(-j..=j)))
        })
        .collect();
    out.extend(random_patch(extra, seed ^ 0x5eed));
    out
}

/// Values of a named column, top to bottom.
pub fn column(t: &Table, name: &str) -> Vec<Value> {
    let icol = t
        .column_index(name)
        .unwrap_or_else(|| panic!("no column {name} in {:?}", names(t)));
    t.column_values(icol).cloned().collect()
}

pub fn names(t: &Table) -> Vec<String> {
    t.columns().iter().map(|c| c.name.clone()).collect()
}

pub fn ints(xs: &[Option<i64>]) -> Vec<Value> {
    xs.iter().map(|x| x.map_or(Value::Null, Value::Int)).collect()
}
