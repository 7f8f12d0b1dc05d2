//! Union-find over dense row indices.
//!
//! [`DisjointSet`] is the single-threaded structure behind
//! [`LinkSet`](super::LinkSet). [`AtomicDisjointSet`] is its lock-free
//! counterpart, shared by worker threads while pair scores are being found:
//! a union only ever hangs the larger of two roots beneath the smaller one,
//! so the final root of every component is its minimum index whatever order
//! the unions arrive in.

use super::{RowLink, RowRef};
use crate::match_error::MatchError;
use crate::util::FastMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Sequential union-find with union by rank and path halving.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Add a new singleton element and return its index.
    pub fn push(&mut self) -> Result<u32, MatchError> {
        let id = u32::try_from(self.parent.len())
            .map_err(|_| MatchError::ResourceExhausted("link index exceeds u32 range".into()))?;
        self.parent
            .try_reserve(1)
            .map_err(MatchError::exhausted("link set"))?;
        self.rank.try_reserve(1).map_err(MatchError::exhausted("link set"))?;
        self.parent.push(id);
        self.rank.push(0);
        Ok(id)
    }

    pub fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    /// Merge the sets holding `a` and `b`; returns false if already merged.
    pub fn union(&mut self, a: u32, b: u32) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (lo, hi) = if self.rank[ra as usize] >= self.rank[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[hi as usize] = lo;
        if self.rank[lo as usize] == self.rank[hi as usize] {
            self.rank[lo as usize] += 1;
        }
        true
    }
}

/// Lock-free union-find for concurrent consolidation.
#[derive(Debug)]
pub struct AtomicDisjointSet {
    parent: Vec<AtomicU32>,
}

impl AtomicDisjointSet {
    pub fn new(size: usize) -> Result<Self, MatchError> {
        if size > u32::MAX as usize {
            return Err(MatchError::ResourceExhausted(format!(
                "{size} rows exceed the link index range"
            )));
        }
        let mut parent = Vec::new();
        parent
            .try_reserve_exact(size)
            .map_err(MatchError::exhausted("group index"))?;
        parent.extend((0..size as u32).map(AtomicU32::new));
        Ok(Self { parent })
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    #[inline]
    fn get(&self, idx: u32) -> u32 {
        self.parent[idx as usize].load(Ordering::Acquire)
    }

    /// Root of `x`, halving the path on the way up.
    pub fn find(&self, mut x: u32) -> u32 {
        loop {
            let p = self.get(x);
            if p == x {
                return x;
            }
            let gp = self.get(p);
            if gp != p {
                // Losing this race only costs a longer path next time.
                let _ = self.parent[x as usize].compare_exchange_weak(
                    p,
                    gp,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            x = p;
        }
    }

    /// Merge the sets holding `a` and `b`; returns false if already merged.
    pub fn union(&self, a: u32, b: u32) -> bool {
        loop {
            let ra = self.find(a);
            let rb = self.find(b);
            if ra == rb {
                return false;
            }
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            if self.parent[hi as usize]
                .compare_exchange(hi, lo, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Group every index by its root, components in order of their minimum
    /// member, members ascending. Components smaller than `min_size` are
    /// dropped. Call only once all unions have finished.
    pub fn components(&self, min_size: usize) -> Vec<Vec<u32>> {
        let mut slot_of_root = FastMap::<u32, usize>::default();
        let mut comps: Vec<Vec<u32>> = Vec::new();
        for x in 0..self.parent.len() as u32 {
            let root = self.find(x);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                comps.push(Vec::new());
                comps.len() - 1
            });
            comps[slot].push(x);
        }
        comps.retain(|c| c.len() >= min_size);
        comps
    }
}

/// Dense numbering of all rows of several tables, table after table.
#[derive(Debug, Clone)]
pub struct RefSpace {
    offsets: Vec<usize>,
}

impl RefSpace {
    pub fn new(row_counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(row_counts.len() + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &n in row_counts {
            total += n;
            offsets.push(total);
        }
        Self { offsets }
    }

    pub fn total(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn dense(&self, r: RowRef) -> u32 {
        (self.offsets[r.table()] + r.row()) as u32
    }

    pub fn row_ref(&self, dense: u32) -> RowRef {
        let d = dense as usize;
        let itable = self.offsets.partition_point(|&off| off <= d) - 1;
        RowRef::new(itable, d - self.offsets[itable])
    }

    /// Turn the components of `sets` into links (only those with at least
    /// `min_size` rows), in canonical order.
    pub fn links(&self, sets: &AtomicDisjointSet, min_size: usize) -> Vec<RowLink> {
        sets.components(min_size)
            .into_iter()
            .map(|comp| RowLink::new(comp.into_iter().map(|d| self.row_ref(d))))
            .collect()
    }
}
