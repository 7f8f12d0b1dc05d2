use super::disjoint::DisjointSet;
use super::{RowLink, RowRef};
use crate::debug_invariants::DebugInvariants;
use crate::match_error::MatchError;
use crate::util::{FastMap, FastSet};

/// Consolidating set of row links.
///
/// Adding a link that shares any row with links already present merges them
/// all into one, so every [`RowRef`] belongs to exactly one link. Rows are
/// interned to dense ids and merged with a union-find, so building a set of
/// many millions of rows stays near-linear.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    ids: FastMap<RowRef, u32>,
    refs: Vec<RowRef>,
    sets: DisjointSet,
    groups: usize,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, r: RowRef) -> Result<(u32, bool), MatchError> {
        if let Some(&id) = self.ids.get(&r) {
            return Ok((id, false));
        }
        self.ids
            .try_reserve(1)
            .map_err(MatchError::exhausted("link set"))?;
        self.refs
            .try_reserve(1)
            .map_err(MatchError::exhausted("link set"))?;
        let id = self.sets.push()?;
        self.ids.insert(r, id);
        self.refs.push(r);
        Ok((id, true))
    }

    /// Insert `link`, merging it with every existing link it overlaps.
    pub fn add_link(&mut self, link: &RowLink) -> Result<(), MatchError> {
        let mut anchor = None;
        for &r in link.refs() {
            let (id, fresh) = self.intern(r)?;
            if fresh {
                self.groups += 1;
            }
            match anchor {
                None => anchor = Some(id),
                Some(a) => {
                    if self.sets.union(a, id) {
                        self.groups -= 1;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn add_links<'a>(&mut self, links: impl IntoIterator<Item = &'a RowLink>) -> Result<(), MatchError> {
        links.into_iter().try_for_each(|l| self.add_link(l))
    }

    pub fn contains_ref(&self, r: &RowRef) -> bool {
        self.ids.contains_key(r)
    }

    /// Number of distinct rows held.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Number of links (disjoint groups) held.
    pub fn len(&self) -> usize {
        self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups == 0
    }

    /// Links in canonical order: ascending by their lowest row reference.
    pub fn sort(&self) -> Vec<RowLink> {
        let mut sets = self.sets.clone();
        let mut members: FastMap<u32, Vec<RowRef>> = FastMap::default();
        for (id, &r) in self.refs.iter().enumerate() {
            members.entry(sets.find(id as u32)).or_default().push(r);
        }
        let mut links: Vec<RowLink> = members.into_values().map(RowLink::new).collect();
        links.sort_unstable();
        links
    }
}

impl DebugInvariants for LinkSet {
    fn validate_invariants(&self) -> Result<(), MatchError> {
        let links = self.sort();
        if links.len() != self.groups {
            return Err(MatchError::Config(format!(
                "link count {} disagrees with group count {}",
                links.len(),
                self.groups
            )));
        }
        let mut seen = FastSet::default();
        for link in &links {
            for r in link.refs() {
                if !seen.insert(*r) {
                    return Err(MatchError::Config(format!("row {r} claimed by two links")));
                }
            }
        }
        if seen.len() != self.refs.len() {
            return Err(MatchError::Config("rows lost during consolidation".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(t: usize, i: usize) -> RowRef {
        RowRef::new(t, i)
    }

    #[test]
    fn overlapping_links_merge() {
        let mut set = LinkSet::new();
        set.add_link(&RowLink::new([r(0, 0), r(1, 0)])).unwrap();
        set.add_link(&RowLink::new([r(0, 5), r(1, 3)])).unwrap();
        assert_eq!(set.len(), 2);
        set.add_link(&RowLink::new([r(1, 0), r(2, 7)])).unwrap();
        assert_eq!(set.len(), 2);
        set.add_link(&RowLink::new([r(2, 7), r(1, 3)])).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.ref_count(), 5);
        let links = set.sort();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].refs(), &[r(0, 0), r(0, 5), r(1, 0), r(1, 3), r(2, 7)]);
        set.validate_invariants().unwrap();
    }

    #[test]
    fn singles_and_sort_order() {
        let mut set = LinkSet::new();
        set.add_link(&RowLink::single(r(1, 2))).unwrap();
        set.add_link(&RowLink::new([r(0, 4), r(1, 9)])).unwrap();
        set.add_link(&RowLink::single(r(0, 1))).unwrap();
        set.add_link(&RowLink::single(r(0, 1))).unwrap();
        assert_eq!(set.len(), 3);
        let firsts: Vec<_> = set.sort().iter().filter_map(RowLink::first).collect();
        assert_eq!(firsts, vec![r(0, 1), r(0, 4), r(1, 2)]);
        assert!(set.contains_ref(&r(1, 9)));
        assert!(!set.contains_ref(&r(1, 8)));
    }
}
