//! Row matcher: bins rows, scores candidates that share a bin, and
//! consolidates the matching pairs into links.
//!
//! All tuples are extracted before the matcher is built, so every phase
//! here is pure computation over immutable data. Per-row work runs through
//! a [`RowRunner`]; the only shared mutable structure during scoring is the
//! lock-free [`AtomicDisjointSet`] used by group and internal matching.
//! Results are always returned in canonical link order, whatever the runner
//! mode.

pub mod bins;
pub mod modes;
pub mod runner;

pub use bins::BinIndex;
pub use modes::{JoinType, MultiJoinType, PairMode};
pub use runner::{RowCollector, RowRunner, RunnerMode};

use crate::debug_invariants::DebugInvariants;
use crate::engine::{EngineOps, MatchEngine};
use crate::link::{
    AtomicDisjointSet, LinkSet, RefSpace, RowLink, RowRef, best_unique_links, eliminate_internal_links,
    missing_singles,
};
use crate::match_error::MatchError;
use crate::tuple::Tuple;
use bins::{BinCollector, tuple_bins};
use itertools::Itertools;

/// Matches the rows of one or more tables with a single engine.
#[derive(Debug)]
pub struct RowMatcher {
    engine: MatchEngine,
    tables: Vec<Vec<Tuple>>,
    runner: RowRunner,
}

impl RowMatcher {
    /// `tables[i][j]` is the tuple of row `j` of table `i`, already in the
    /// engine's native units.
    pub fn new(engine: MatchEngine, tables: Vec<Vec<Tuple>>, runner: RowRunner) -> Result<Self, MatchError> {
        let arity = engine.tuple_infos().len();
        for tuples in &tables {
            if let Some(bad) = tuples.iter().find(|t| t.len() != arity) {
                return Err(MatchError::TupleArity {
                    engine: engine.name(),
                    expected: arity,
                    found: bad.len(),
                });
            }
        }
        Ok(Self {
            engine,
            tables,
            runner,
        })
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    pub fn runner(&self) -> &RowRunner {
        &self.runner
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn row_count(&self, itable: usize) -> usize {
        self.tables[itable].len()
    }

    fn row_counts(&self) -> Vec<usize> {
        self.tables.iter().map(Vec::len).collect()
    }

    #[inline]
    fn tuple(&self, r: RowRef) -> &Tuple {
        &self.tables[r.table()][r.row()]
    }

    /// Score with the lower reference first, so a pair is scored the same
    /// way whichever side found it.
    #[inline]
    fn score(&self, a: RowRef, b: RowRef) -> Option<f64> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.engine.score(self.tuple(lo), self.tuple(hi))
    }

    fn require_tables(&self, what: &str, ok: bool) -> Result<(), MatchError> {
        if ok {
            Ok(())
        } else {
            Err(MatchError::Config(format!(
                "{what} is not possible with {} table(s)",
                self.tables.len()
            )))
        }
    }

    fn check_join_types(&self, join_types: &[MultiJoinType]) -> Result<(), MatchError> {
        if join_types.len() != self.tables.len() {
            return Err(MatchError::Config(format!(
                "{} join types given for {} tables",
                join_types.len(),
                self.tables.len()
            )));
        }
        Ok(())
    }

    fn bin_table(&self, itable: usize) -> Result<BinIndex, MatchError> {
        let collector = BinCollector {
            engine: &self.engine,
            tuples: &self.tables[itable],
            itable,
        };
        let stage = format!("Binning rows for table {}", itable + 1);
        let mut index = self.runner.collect(&stage, &collector, self.row_count(itable))?;
        index.finish();
        log::debug!(
            "table {}: {} rows in {} bins ({} entries)",
            itable + 1,
            self.row_count(itable),
            index.len(),
            index.ref_count()
        );
        Ok(index)
    }

    fn bin_all(&self) -> Result<BinIndex, MatchError> {
        let mut index = BinIndex::new();
        for itable in 0..self.tables.len() {
            index.merge(self.bin_table(itable)?)?;
        }
        index.finish();
        Ok(index)
    }

    fn scan_pairs(&self, index: &BinIndex, scan_table: usize, best_only: bool) -> Result<Vec<RowLink>, MatchError> {
        let collector = PairScan {
            matcher: self,
            index,
            scan_table,
            best_only,
        };
        let stage = format!("Scoring pairs for table {}", scan_table + 1);
        let mut links = self.runner.collect(&stage, &collector, self.row_count(scan_table))?;
        links.sort_unstable();
        Ok(links)
    }

    /// Union every matching pair of rows into one disjoint-set forest over
    /// all rows; `internal` selects same-table pairs instead of cross-table.
    fn link_graph(&self, index: &BinIndex, space: &RefSpace, internal: bool) -> Result<AtomicDisjointSet, MatchError> {
        let sets = AtomicDisjointSet::new(space.total())?;
        let collector = GraphScan {
            matcher: self,
            index,
            space,
            sets: &sets,
            internal,
        };
        let npair = self
            .runner
            .collect("Scoring candidate pairs", &collector, space.total())?;
        log::debug!("{npair} matching pairs");
        Ok(sets)
    }

    fn consolidate(&self, links: &[RowLink]) -> Result<Vec<RowLink>, MatchError> {
        let progress = self.runner.progress();
        progress.start_stage("Consolidating links");
        let mut set = LinkSet::new();
        let added = set.add_links(links);
        progress.end_stage();
        added?;
        set.debug_assert_invariants();
        Ok(set.sort())
    }

    /// Two-table pair match.
    pub fn find_pair_matches(&self, mode: PairMode) -> Result<Vec<RowLink>, MatchError> {
        self.require_tables("pair matching", self.tables.len() == 2)?;
        let links = match mode {
            PairMode::All => {
                let index = self.bin_table(1)?;
                self.scan_pairs(&index, 0, false)?
            }
            PairMode::Best => {
                let index = self.bin_table(1)?;
                let pairs = self.scan_pairs(&index, 0, false)?;
                self.runner.cancel_token().check()?;
                best_unique_links(pairs)
            }
            PairMode::Best1 => {
                let index = self.bin_table(1)?;
                self.scan_pairs(&index, 0, true)?
            }
            PairMode::Best2 => {
                let index = self.bin_table(0)?;
                self.scan_pairs(&index, 1, true)?
            }
        };
        self.runner
            .progress()
            .log_message(&format!("{} pair(s) found ({mode})", links.len()));
        Ok(links)
    }

    /// Matches of every other table against table `reference`. Each output
    /// link holds one reference row and its matches (the best per table if
    /// `best_only`).
    pub fn find_multi_pair_matches(
        &self,
        reference: usize,
        best_only: bool,
        join_types: &[MultiJoinType],
    ) -> Result<Vec<RowLink>, MatchError> {
        self.require_tables("multi-table pair matching", self.tables.len() >= 2)?;
        self.check_join_types(join_types)?;
        if reference >= self.tables.len() {
            return Err(MatchError::Config(format!(
                "reference table {} out of range 1..={}",
                reference + 1,
                self.tables.len()
            )));
        }

        let index = self.bin_table(reference)?;
        let mut scored: Vec<(RowRef, RowRef, f64)> = Vec::new();
        for itable in (0..self.tables.len()).filter(|&t| t != reference) {
            for pair in self.scan_pairs(&index, itable, false)? {
                let (Some(r0), Some(r1), Some(s)) = (
                    pair.ref_for_table(reference),
                    pair.ref_for_table(itable),
                    pair.score(),
                ) else {
                    continue;
                };
                scored.push((r0, r1, s));
            }
        }
        self.runner.cancel_token().check()?;

        scored.sort_unstable_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.table().cmp(&b.1.table()))
                .then(a.2.total_cmp(&b.2))
                .then(a.1.cmp(&b.1))
        });
        // One link per reference row and choice of partner in each other
        // table: the best partner only, or every combination.
        let mut links = Vec::new();
        for group in scored.chunk_by(|a, b| a.0 == b.0) {
            let r0 = group[0].0;
            let per_table: Vec<&[(RowRef, RowRef, f64)]> = group
                .chunk_by(|a, b| a.1.table() == b.1.table())
                .map(|matches| if best_only { &matches[..1] } else { matches })
                .collect();
            for combo in per_table.iter().map(|m| m.iter()).multi_cartesian_product() {
                let score = match combo.as_slice() {
                    [(_, _, s)] => Some(*s),
                    _ => None,
                };
                let refs = std::iter::once(r0).chain(combo.iter().map(|m| m.1));
                links.try_reserve(1).map_err(MatchError::exhausted("multi-pair links"))?;
                links.push(RowLink::new(refs).with_score(score));
            }
        }

        let mut extra = Vec::new();
        for (itable, jt) in join_types.iter().enumerate() {
            if *jt == MultiJoinType::Always {
                extra.extend(missing_singles(&links, itable, self.row_count(itable)));
            }
        }
        links.extend(extra);
        links.retain(|l| MultiJoinType::accept_link(join_types, l));
        links.sort_unstable();
        Ok(links)
    }

    /// Groups of rows from different tables connected by chains of pair
    /// matches, reduced to at most one row per table.
    pub fn find_group_matches(&self, join_types: &[MultiJoinType]) -> Result<Vec<RowLink>, MatchError> {
        self.require_tables("group matching", self.tables.len() >= 2)?;
        self.check_join_types(join_types)?;
        let index = self.bin_all()?;
        let space = RefSpace::new(&self.row_counts());
        let sets = self.link_graph(&index, &space, false)?;
        drop(index);
        self.runner.cancel_token().check()?;

        let mut links = eliminate_internal_links(space.links(&sets, 2));
        let mut extra = Vec::new();
        for (itable, jt) in join_types.iter().enumerate() {
            if *jt == MultiJoinType::Always {
                extra.extend(missing_singles(&links, itable, self.row_count(itable)));
            }
        }
        links.extend(extra);
        links.retain(|l| MultiJoinType::accept_link(join_types, l));
        self.consolidate(&links)
    }

    /// Groups of mutually matching rows within the single table.
    pub fn find_internal_matches(&self, include_singles: bool) -> Result<Vec<RowLink>, MatchError> {
        self.require_tables("internal matching", self.tables.len() == 1)?;
        let index = self.bin_table(0)?;
        let space = RefSpace::new(&self.row_counts());
        let sets = self.link_graph(&index, &space, true)?;
        drop(index);
        self.runner.cancel_token().check()?;

        let mut links = space.links(&sets, 2);
        if include_singles {
            let singles = missing_singles(&links, 0, self.row_count(0));
            links.extend(singles);
        }
        self.consolidate(&links)
    }
}

/// Scores each row of one table against the rows sharing its bins.
struct PairScan<'a> {
    matcher: &'a RowMatcher,
    index: &'a BinIndex,
    scan_table: usize,
    best_only: bool,
}

impl RowCollector for PairScan<'_> {
    type Acc = Vec<RowLink>;

    fn create(&self) -> Vec<RowLink> {
        Vec::new()
    }

    fn accumulate(&self, acc: &mut Vec<RowLink>, irow: usize) -> Result<(), MatchError> {
        let m = self.matcher;
        let r = RowRef::new(self.scan_table, irow);
        let mut keys = Vec::new();
        tuple_bins(&m.engine, m.tuple(r), &mut keys)?;
        if keys.is_empty() {
            return Ok(());
        }
        let (mut scratch, mut candidates) = (Vec::new(), Vec::new());
        self.index
            .candidates(&keys, m.engine.bin_parts(), &mut scratch, &mut candidates);
        let mut best: Option<(f64, RowRef)> = None;
        for &c in candidates.iter().filter(|c| c.table() != r.table()) {
            let Some(s) = m.score(r, c) else { continue };
            if !self.best_only {
                acc.try_reserve(1).map_err(MatchError::exhausted("pair list"))?;
                acc.push(RowLink::pair(r, c, s));
            } else if best.is_none_or(|(b, _)| s < b) {
                best = Some((s, c));
            }
        }
        if let Some((s, c)) = best {
            acc.try_reserve(1).map_err(MatchError::exhausted("pair list"))?;
            acc.push(RowLink::pair(r, c, s));
        }
        Ok(())
    }

    fn combine(&self, mut earlier: Vec<RowLink>, later: Vec<RowLink>) -> Result<Vec<RowLink>, MatchError> {
        earlier
            .try_reserve(later.len())
            .map_err(MatchError::exhausted("pair list"))?;
        earlier.extend(later);
        Ok(earlier)
    }
}

/// Unions matching pairs over a dense numbering of all rows.
struct GraphScan<'a> {
    matcher: &'a RowMatcher,
    index: &'a BinIndex,
    space: &'a RefSpace,
    sets: &'a AtomicDisjointSet,
    internal: bool,
}

impl RowCollector for GraphScan<'_> {
    type Acc = usize;

    fn create(&self) -> usize {
        0
    }

    fn accumulate(&self, acc: &mut usize, dense: usize) -> Result<(), MatchError> {
        let m = self.matcher;
        let r = self.space.row_ref(dense as u32);
        let mut keys = Vec::new();
        tuple_bins(&m.engine, m.tuple(r), &mut keys)?;
        if keys.is_empty() {
            return Ok(());
        }
        let (mut scratch, mut candidates) = (Vec::new(), Vec::new());
        self.index
            .candidates(&keys, m.engine.bin_parts(), &mut scratch, &mut candidates);
        for &c in &candidates {
            if c <= r || (c.table() == r.table()) != self.internal {
                continue;
            }
            if m.score(r, c).is_some() {
                self.sets.union(dense as u32, self.space.dense(c));
                *acc += 1;
            }
        }
        Ok(())
    }

    fn combine(&self, earlier: usize, later: usize) -> Result<usize, MatchError> {
        Ok(earlier + later)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixellatorKind;
    use crate::tuple::reals;

    fn iso(err: f64) -> MatchEngine {
        MatchEngine::parse("1d", PixellatorKind::Healpix, false)
            .unwrap()
            .configure(&[err], &[])
            .unwrap()
    }

    fn column(xs: &[f64]) -> Vec<Tuple> {
        xs.iter().map(|&x| reals(&[x])).collect()
    }

    fn matcher(err: f64, tables: &[&[f64]]) -> RowMatcher {
        let tuples = tables.iter().map(|xs| column(xs)).collect();
        RowMatcher::new(iso(err), tuples, RowRunner::sequential()).unwrap()
    }

    fn r(t: usize, i: usize) -> RowRef {
        RowRef::new(t, i)
    }

    fn refs(links: &[RowLink]) -> Vec<Vec<RowRef>> {
        links.iter().map(|l| l.refs().to_vec()).collect()
    }

    #[test]
    fn pair_modes() {
        // 0.0 is close to both 0.1 and 0.3; 0.25 only to 0.3.
        let m = matcher(0.5, &[&[0.0, 0.25], &[0.1, 0.3]]);
        let all = m.find_pair_matches(PairMode::All).unwrap();
        assert_eq!(all.len(), 4);
        let best = m.find_pair_matches(PairMode::Best).unwrap();
        assert_eq!(refs(&best), vec![vec![r(0, 0), r(1, 0)], vec![r(0, 1), r(1, 1)]]);
        let best1 = m.find_pair_matches(PairMode::Best1).unwrap();
        assert_eq!(refs(&best1), vec![vec![r(0, 0), r(1, 0)], vec![r(0, 1), r(1, 1)]]);
        let best2 = m.find_pair_matches(PairMode::Best2).unwrap();
        assert_eq!(refs(&best2), vec![vec![r(0, 0), r(1, 0)], vec![r(0, 1), r(1, 1)]]);
    }

    #[test]
    fn best1_can_reuse_rows_but_best_cannot() {
        let m = matcher(1.0, &[&[0.0, 0.1], &[0.05]]);
        let best1 = m.find_pair_matches(PairMode::Best1).unwrap();
        assert_eq!(best1.len(), 2);
        let best = m.find_pair_matches(PairMode::Best).unwrap();
        assert_eq!(best.len(), 1);
    }

    #[test]
    fn ties_go_to_the_lowest_row() {
        let m = matcher(1.0, &[&[0.0], &[0.5, -0.5]]);
        let best1 = m.find_pair_matches(PairMode::Best1).unwrap();
        assert_eq!(refs(&best1), vec![vec![r(0, 0), r(1, 0)]]);
    }

    #[test]
    fn internal_groups() {
        let m = matcher(1.0, &[&[0.0, 5.0, 0.8, 1.6, 9.0]]);
        let groups = m.find_internal_matches(false).unwrap();
        assert_eq!(refs(&groups), vec![vec![r(0, 0), r(0, 2), r(0, 3)]]);
        let with_singles = m.find_internal_matches(true).unwrap();
        assert_eq!(with_singles.len(), 3);
    }

    #[test]
    fn wrong_table_counts_are_config_errors() {
        let one = matcher(1.0, &[&[0.0]]);
        assert!(one.find_pair_matches(PairMode::All).unwrap_err().is_config_error());
        let two = matcher(1.0, &[&[0.0], &[0.0]]);
        assert!(two.find_internal_matches(false).unwrap_err().is_config_error());
        assert!(two.find_group_matches(&[MultiJoinType::Default]).unwrap_err().is_config_error());
        assert!(
            two.find_multi_pair_matches(2, true, &[MultiJoinType::Default; 2])
                .unwrap_err()
                .is_config_error()
        );
    }

    #[test]
    fn tuple_arity_is_checked() {
        let tuples = vec![vec![reals(&[0.0, 1.0])]];
        let err = RowMatcher::new(iso(1.0), tuples, RowRunner::sequential()).unwrap_err();
        assert!(matches!(err, MatchError::TupleArity { expected: 1, found: 2, .. }));
    }

    #[test]
    fn multi_pairs_keep_best_per_table() {
        let m = matcher(1.0, &[&[0.0, 10.0], &[0.2, 0.1], &[0.5]]);
        let dflt = [MultiJoinType::Default; 3];
        let best = m.find_multi_pair_matches(0, true, &dflt).unwrap();
        assert_eq!(refs(&best), vec![vec![r(0, 0), r(1, 1), r(2, 0)]]);
        let all = m.find_multi_pair_matches(0, false, &dflt).unwrap();
        assert_eq!(
            refs(&all),
            vec![vec![r(0, 0), r(1, 0), r(2, 0)], vec![r(0, 0), r(1, 1), r(2, 0)]]
        );
        let always = [MultiJoinType::Always, MultiJoinType::Default, MultiJoinType::Default];
        let with_single = m.find_multi_pair_matches(0, true, &always).unwrap();
        assert_eq!(with_single.len(), 2);
        assert_eq!(with_single[1].refs(), &[r(0, 1)]);
    }

    fn err_engine(scale: f64) -> MatchEngine {
        MatchEngine::parse("1d_err", PixellatorKind::Healpix, false)
            .unwrap()
            .configure(&[scale], &[])
            .unwrap()
    }

    fn with_errors(rows: &[(f64, f64)]) -> Vec<Tuple> {
        rows.iter().map(|&(x, e)| reals(&[x, e])).collect()
    }

    #[test]
    fn best_keeps_only_mutual_best_pairs() {
        // 0:1 prefers 1:0, which is already taken by 0:0, so 0:1 goes
        // unmatched rather than falling back to 1:1.
        let tuples = vec![
            with_errors(&[(0.0, 0.5), (0.25, 0.5)]),
            with_errors(&[(0.1, 0.5), (0.5, 0.5)]),
        ];
        let m = RowMatcher::new(err_engine(1.0), tuples, RowRunner::sequential()).unwrap();
        assert_eq!(m.find_pair_matches(PairMode::All).unwrap().len(), 4);
        let best = m.find_pair_matches(PairMode::Best).unwrap();
        assert_eq!(refs(&best), vec![vec![r(0, 0), r(1, 0)]]);
    }

    #[test]
    fn oversized_errors_are_resource_errors() {
        let tuples = vec![with_errors(&[(0.0, 1e6)]), with_errors(&[(0.0, 0.1)])];
        let m = RowMatcher::new(err_engine(1e-3), tuples, RowRunner::sequential()).unwrap();
        for mode in [PairMode::All, PairMode::Best1, PairMode::Best2] {
            let err = m.find_pair_matches(mode).unwrap_err();
            assert!(err.is_resource_exhausted(), "{mode:?}: {err}");
        }
        assert!(
            m.find_group_matches(&[MultiJoinType::Default; 2])
                .unwrap_err()
                .is_resource_exhausted()
        );
    }
}
