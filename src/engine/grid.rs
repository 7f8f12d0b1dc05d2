//! Cartesian grid binning shared by the Cartesian engines.

use super::BinKey;
use crate::match_error::MatchError;
use itertools::Itertools;

/// Most grid cells a single row may be filed under.
pub const MAX_CELLS_PER_ROW: u64 = 1 << 20;

/// Append the keys of every grid cell overlapped by the box
/// `centre[i] ± half[i]`, with cells of edge `cell[i]` along axis `i`.
///
/// Non-finite input yields no cells at all. A box covering more than
/// [`MAX_CELLS_PER_ROW`] cells is a resource error, raised before any cell
/// is generated.
pub fn cell_bins(centre: &[f64], half: &[f64], cell: &[f64], out: &mut Vec<BinKey>) -> Result<(), MatchError> {
    let mut ranges = Vec::with_capacity(centre.len());
    for ((&x, &h), &c) in centre.iter().zip(half).zip(cell) {
        let lo = ((x - h) / c).floor();
        let hi = ((x + h) / c).floor();
        if !(lo.is_finite() && hi.is_finite()) || hi < lo {
            return Ok(());
        }
        ranges.push((lo, hi));
    }

    let ncell = ranges.iter().try_fold(1u64, |acc, &(lo, hi)| {
        let span = hi - lo + 1.0;
        if span > MAX_CELLS_PER_ROW as f64 {
            None
        } else {
            acc.checked_mul(span as u64).filter(|&n| n <= MAX_CELLS_PER_ROW)
        }
    });
    let Some(ncell) = ncell else {
        return Err(MatchError::ResourceExhausted(format!(
            "row covers more than {MAX_CELLS_PER_ROW} grid cells"
        )));
    };
    out.try_reserve(ncell as usize)
        .map_err(MatchError::exhausted("grid cell keys"))?;

    let mut ranges: Vec<_> = ranges.into_iter().map(|(lo, hi)| lo as i64..=hi as i64).collect();
    if ranges.len() == 1 {
        out.extend(ranges.remove(0).map(|i| BinKey::Cell(Box::new([i]))));
    } else {
        out.extend(
            ranges
                .into_iter()
                .multi_cartesian_product()
                .map(|cell| BinKey::Cell(cell.into_boxed_slice())),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(centre: &[f64], half: &[f64], cell: &[f64]) -> Vec<BinKey> {
        let mut out = Vec::new();
        cell_bins(centre, half, cell, &mut out).unwrap();
        out
    }

    #[test]
    fn straddling_a_boundary_gives_both_cells() {
        assert_eq!(cells(&[0.95], &[0.1], &[1.0]).len(), 2);
        assert_eq!(cells(&[0.5], &[0.1], &[1.0]), vec![BinKey::Cell(Box::new([0]))]);
        assert_eq!(cells(&[-0.05], &[0.01], &[1.0]), vec![BinKey::Cell(Box::new([-1]))]);
    }

    #[test]
    fn product_over_dimensions() {
        let keys = cells(&[0.95, 1.95], &[0.1, 0.1], &[1.0, 1.0]);
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&BinKey::Cell(Box::new([1, 2]))));
        assert!(keys.contains(&BinKey::Cell(Box::new([0, 1]))));
    }

    #[test]
    fn nan_gives_nothing() {
        assert!(cells(&[f64::NAN, 0.0], &[0.1, 0.1], &[1.0, 1.0]).is_empty());
        assert!(cells(&[0.0], &[f64::INFINITY], &[1.0]).is_empty());
    }

    #[test]
    fn oversized_boxes_are_resource_errors() {
        let mut out = Vec::new();
        let err = cell_bins(&[0.0], &[1e6], &[1e-3], &mut out).unwrap_err();
        assert!(err.is_resource_exhausted());
        assert!(out.is_empty());

        // Each axis alone is small enough, the product is not.
        let err = cell_bins(&[0.0; 3], &[100.0; 3], &[1.0; 3], &mut out).unwrap_err();
        assert!(err.is_resource_exhausted());

        assert_eq!(cells(&[0.0, 0.0], &[100.0, 100.0], &[1.0, 1.0]).len(), 201 * 201);
    }
}
