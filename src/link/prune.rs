//! Post-processing of link collections.

use super::{RowLink, RowRef};
use crate::util::FastSet;
use itertools::Itertools;
use std::cmp::Ordering;

/// Compare scores, treating a missing score as worse than any present one.
pub fn cmp_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keep only mutual-best links.
///
/// Links are visited in ascending (score, canonical order) and every row a
/// link mentions is marked as seen, whether or not the link survives. A link
/// is kept only if none of its rows had been seen before it, so each kept
/// link is the best candidate of every row it holds. The result is in
/// canonical order.
pub fn best_unique_links(mut links: Vec<RowLink>) -> Vec<RowLink> {
    links.sort_unstable_by(|a, b| cmp_scores(a.score(), b.score()).then_with(|| a.cmp(b)));
    let mut seen = FastSet::<RowRef>::default();
    let mut kept: Vec<RowLink> = links
        .into_iter()
        .filter(|link| {
            // No short-circuit: a rejected link still uses up all its rows.
            link.refs().iter().fold(true, |fresh, &r| seen.insert(r) && fresh)
        })
        .collect();
    kept.sort_unstable();
    kept
}

/// Reduce each link to at most one row per table, keeping the earliest row
/// of each table; links left with fewer than two rows are dropped.
pub fn eliminate_internal_links(links: Vec<RowLink>) -> Vec<RowLink> {
    links
        .into_iter()
        .filter_map(|link| {
            let reps: Vec<RowRef> = link
                .refs()
                .iter()
                .copied()
                .dedup_by(|a, b| a.table() == b.table())
                .collect();
            if reps.len() < 2 {
                None
            } else if reps.len() == link.len() {
                Some(link)
            } else {
                Some(RowLink::new(reps))
            }
        })
        .collect()
}

/// Singleton links for every row of table `itable` that no link mentions.
pub fn missing_singles(links: &[RowLink], itable: usize, nrow: usize) -> Vec<RowLink> {
    let mut present = vec![false; nrow];
    for r in links.iter().flat_map(|l| l.refs_for_table(itable)) {
        present[r.row()] = true;
    }
    present
        .iter()
        .enumerate()
        .filter(|&(_, &p)| !p)
        .map(|(irow, _)| RowLink::single(RowRef::new(itable, irow)))
        .collect()
}
