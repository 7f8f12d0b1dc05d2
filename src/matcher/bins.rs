//! Bin index: every row reference filed under each of its bin keys.

use crate::engine::{BinKey, EngineOps, MatchEngine};
use crate::link::RowRef;
use crate::match_error::MatchError;
use crate::matcher::runner::RowCollector;
use crate::tuple::Tuple;
use crate::util::FastMap;

#[derive(Debug, Default, Clone)]
pub struct BinIndex {
    map: FastMap<BinKey, Vec<RowRef>>,
    nref: usize,
}

impl BinIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: BinKey, r: RowRef) -> Result<(), MatchError> {
        self.map.try_reserve(1).map_err(MatchError::exhausted("bin index"))?;
        let list = self.map.entry(key).or_default();
        list.try_reserve(1).map_err(MatchError::exhausted("bin list"))?;
        list.push(r);
        self.nref += 1;
        Ok(())
    }

    /// Move every entry of `other` into `self`.
    pub fn merge(&mut self, other: BinIndex) -> Result<(), MatchError> {
        self.map
            .try_reserve(other.map.len())
            .map_err(MatchError::exhausted("bin index"))?;
        for (key, refs) in other.map {
            let list = self.map.entry(key).or_default();
            list.try_reserve(refs.len())
                .map_err(MatchError::exhausted("bin list"))?;
            list.extend(refs);
        }
        self.nref += other.nref;
        Ok(())
    }

    /// Sort every bin's references and drop repeats.
    pub fn finish(&mut self) {
        self.nref = 0;
        for list in self.map.values_mut() {
            list.sort_unstable();
            list.dedup();
            self.nref += list.len();
        }
    }

    pub fn get(&self, key: &BinKey) -> &[RowRef] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct bins.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Total number of (bin, row) entries.
    pub fn ref_count(&self) -> usize {
        self.nref
    }

    /// Rows sharing at least one key with `keys` in each of `nparts` key
    /// families, ascending, written to `out`.
    pub fn candidates(
        &self,
        keys: &[BinKey],
        nparts: usize,
        scratch: &mut Vec<(RowRef, usize)>,
        out: &mut Vec<RowRef>,
    ) {
        scratch.clear();
        out.clear();
        for key in keys {
            let part = key.part();
            scratch.extend(self.get(key).iter().map(|&r| (r, part)));
        }
        scratch.sort_unstable();
        scratch.dedup();
        let mut i = 0;
        while i < scratch.len() {
            let r = scratch[i].0;
            let mut j = i;
            while j < scratch.len() && scratch[j].0 == r {
                j += 1;
            }
            if j - i == nparts {
                out.push(r);
            }
            i = j;
        }
    }
}

/// Sorted, de-duplicated bin keys of one tuple.
pub(crate) fn tuple_bins(engine: &MatchEngine, tuple: &Tuple, out: &mut Vec<BinKey>) -> Result<(), MatchError> {
    out.clear();
    engine.bins(tuple, out)?;
    out.sort_unstable();
    out.dedup();
    Ok(())
}

/// Files rows `0..n` of one table into a [`BinIndex`].
pub(crate) struct BinCollector<'a> {
    pub engine: &'a MatchEngine,
    pub tuples: &'a [Tuple],
    pub itable: usize,
}

impl RowCollector for BinCollector<'_> {
    type Acc = BinIndex;

    fn create(&self) -> BinIndex {
        BinIndex::new()
    }

    fn accumulate(&self, acc: &mut BinIndex, irow: usize) -> Result<(), MatchError> {
        let mut keys = Vec::new();
        tuple_bins(self.engine, &self.tuples[irow], &mut keys)?;
        let r = RowRef::new(self.itable, irow);
        for key in keys {
            acc.insert(key, r)?;
        }
        Ok(())
    }

    fn combine(&self, mut earlier: BinIndex, later: BinIndex) -> Result<BinIndex, MatchError> {
        earlier.merge(later)?;
        Ok(earlier)
    }
}
