use super::row_ref::RowRef;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A set of rows believed to describe the same object.
///
/// References are kept sorted and free of duplicates, so the first one is
/// always the link's minimum. Equality, hashing and ordering look at the
/// references only; the optional score rides along for pair links.
#[derive(Debug, Clone)]
pub struct RowLink {
    refs: Box<[RowRef]>,
    score: Option<f64>,
}

impl RowLink {
    pub fn new(refs: impl IntoIterator<Item = RowRef>) -> Self {
        let mut refs: Vec<RowRef> = refs.into_iter().collect();
        refs.sort_unstable();
        refs.dedup();
        Self {
            refs: refs.into_boxed_slice(),
            score: None,
        }
    }

    pub fn single(r: RowRef) -> Self {
        Self {
            refs: Box::new([r]),
            score: None,
        }
    }

    /// Two-row link carrying the score of the comparison that made it.
    pub fn pair(a: RowRef, b: RowRef, score: f64) -> Self {
        Self::new([a, b]).with_score(Some(score))
    }

    pub fn with_score(mut self, score: Option<f64>) -> Self {
        self.score = score;
        self
    }

    pub fn refs(&self) -> &[RowRef] {
        &self.refs
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Lowest reference in canonical order.
    pub fn first(&self) -> Option<RowRef> {
        self.refs.first().copied()
    }

    pub fn contains(&self, r: &RowRef) -> bool {
        self.refs.binary_search(r).is_ok()
    }

    /// Earliest reference from table `itable`, if any.
    pub fn ref_for_table(&self, itable: usize) -> Option<RowRef> {
        self.refs_for_table(itable).next()
    }

    pub fn refs_for_table(&self, itable: usize) -> impl Iterator<Item = RowRef> + '_ {
        self.refs.iter().copied().filter(move |r| r.table() == itable)
    }

    /// Sorted, deduplicated table indices present in this link.
    pub fn tables(&self) -> Vec<usize> {
        let mut tables: Vec<usize> = self.refs.iter().map(RowRef::table).collect();
        tables.dedup();
        tables
    }
}

impl PartialEq for RowLink {
    fn eq(&self, other: &Self) -> bool {
        self.refs == other.refs
    }
}

impl Eq for RowLink {}

impl Hash for RowLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.refs.hash(state);
    }
}

impl PartialOrd for RowLink {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowLink {
    fn cmp(&self, other: &Self) -> Ordering {
        self.refs.cmp(&other.refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(t: usize, i: usize) -> RowRef {
        RowRef::new(t, i)
    }

    #[test]
    fn refs_are_sorted_and_unique() {
        let link = RowLink::new([r(1, 5), r(0, 3), r(1, 5), r(0, 1)]);
        assert_eq!(link.refs(), &[r(0, 1), r(0, 3), r(1, 5)]);
        assert_eq!(link.first(), Some(r(0, 1)));
        assert_eq!(link.ref_for_table(1), Some(r(1, 5)));
        assert_eq!(link.tables(), vec![0, 1]);
        assert!(link.contains(&r(0, 3)));
        assert!(!link.contains(&r(2, 0)));
    }

    #[test]
    fn score_does_not_affect_identity() {
        let a = RowLink::pair(r(0, 0), r(1, 0), 0.5);
        let b = RowLink::new([r(1, 0), r(0, 0)]);
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.score(), Some(0.5));
        assert_eq!(b.score(), None);
    }

    #[test]
    fn canonical_order_starts_with_minimum() {
        let mut links = vec![
            RowLink::single(r(1, 0)),
            RowLink::new([r(0, 4), r(1, 1)]),
            RowLink::new([r(0, 2), r(2, 0)]),
        ];
        links.sort();
        let firsts: Vec<_> = links.iter().filter_map(RowLink::first).collect();
        assert_eq!(firsts, vec![r(0, 2), r(0, 4), r(1, 0)]);
    }
}
