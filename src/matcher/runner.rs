//! Row-chunked execution of per-row work, sequential or on a rayon pool.
//!
//! Work is expressed as a [`RowCollector`]: an accumulator is created per
//! chunk, fed every row of the chunk, and chunk results are combined in row
//! order. As long as `combine` is associative the result does not depend on
//! the runner mode, which is what lets the parallel path be checked against
//! the sequential one.

use crate::match_error::MatchError;
use crate::progress::{CancelToken, ProgressIndicator};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Below this many rows a parallel runner works on the calling thread.
pub const PARALLEL_THRESHOLD: usize = 10_000;
/// Pool size used when no thread limit is configured, capped further by
/// the number of available cores.
pub const DEFAULT_MAX_THREADS: usize = 6;
const CHUNK_ROWS: usize = 2048;
const PARTEST_CHUNK_ROWS: usize = 8;
const CLASSIC_LEVEL_STEP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerMode {
    /// Plain loop over rows on the calling thread.
    Classic,
    /// Chunked accumulate/combine, in order, on the calling thread.
    Sequential,
    /// Chunked accumulate/combine on a worker pool for large inputs.
    #[default]
    Parallel,
    /// Like `Parallel`, but always parallel and with tiny chunks.
    ParTest,
}

impl RunnerMode {
    fn uses_pool(self) -> bool {
        matches!(self, RunnerMode::Parallel | RunnerMode::ParTest)
    }
}

impl FromStr for RunnerMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(RunnerMode::Classic),
            "sequential" => Ok(RunnerMode::Sequential),
            "parallel" => Ok(RunnerMode::Parallel),
            "partest" => Ok(RunnerMode::ParTest),
            _ => Err(MatchError::Config(format!(
                "unknown runner mode `{s}` (classic, sequential, parallel, partest)"
            ))),
        }
    }
}

impl fmt::Display for RunnerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunnerMode::Classic => "classic",
            RunnerMode::Sequential => "sequential",
            RunnerMode::Parallel => "parallel",
            RunnerMode::ParTest => "partest",
        })
    }
}

/// Per-row work with an associative combine step.
pub trait RowCollector: Sync {
    type Acc: Send;

    fn create(&self) -> Self::Acc;
    fn accumulate(&self, acc: &mut Self::Acc, irow: usize) -> Result<(), MatchError>;
    /// Merge `later` (covering higher rows) into `earlier`.
    fn combine(&self, earlier: Self::Acc, later: Self::Acc) -> Result<Self::Acc, MatchError>;
}

/// Runs collectors over row ranges, reporting progress and honouring
/// cancellation once per row.
#[derive(Clone)]
pub struct RowRunner {
    mode: RunnerMode,
    pool: Option<Arc<ThreadPool>>,
    cancel: CancelToken,
    progress: Arc<dyn ProgressIndicator>,
}

impl fmt::Debug for RowRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowRunner")
            .field("mode", &self.mode)
            .field("threads", &self.threads())
            .finish_non_exhaustive()
    }
}

impl RowRunner {
    pub fn new(
        mode: RunnerMode,
        threads: Option<usize>,
        cancel: CancelToken,
        progress: Arc<dyn ProgressIndicator>,
    ) -> Result<Self, MatchError> {
        let pool = if mode.uses_pool() {
            let n = match threads {
                Some(0) => {
                    return Err(MatchError::Config("thread limit must be at least 1".into()));
                }
                Some(n) => n,
                None => std::thread::available_parallelism()
                    .map_or(1, |n| n.get())
                    .min(DEFAULT_MAX_THREADS),
            };
            let pool = ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("xmatch-{i}"))
                .build()
                .map_err(|e| MatchError::ResourceExhausted(format!("starting worker pool ({e})")))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(Self {
            mode,
            pool,
            cancel,
            progress,
        })
    }

    /// Runner for the calling thread only, with no progress output.
    pub fn sequential() -> Self {
        Self {
            mode: RunnerMode::Sequential,
            pool: None,
            cancel: CancelToken::new(),
            progress: Arc::new(crate::progress::NullProgress),
        }
    }

    pub fn mode(&self) -> RunnerMode {
        self.mode
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn progress(&self) -> &dyn ProgressIndicator {
        self.progress.as_ref()
    }

    /// Feed rows `0..nrow` to `collector` as one progress stage.
    pub fn collect<C: RowCollector>(&self, stage: &str, collector: &C, nrow: usize) -> Result<C::Acc, MatchError> {
        self.cancel.check()?;
        self.progress.start_stage(stage);
        let result = match (self.mode, &self.pool) {
            (RunnerMode::Classic, _) => self.classic(collector, nrow),
            (RunnerMode::ParTest, Some(pool)) => self.parallel(pool, collector, nrow, PARTEST_CHUNK_ROWS),
            (RunnerMode::Parallel, Some(pool)) if nrow >= PARALLEL_THRESHOLD => {
                self.parallel(pool, collector, nrow, CHUNK_ROWS)
            }
            _ => self.chunked(collector, nrow),
        };
        self.progress.end_stage();
        result
    }

    fn classic<C: RowCollector>(&self, collector: &C, nrow: usize) -> Result<C::Acc, MatchError> {
        let mut acc = collector.create();
        for irow in 0..nrow {
            self.cancel.check()?;
            collector.accumulate(&mut acc, irow)?;
            if irow % CLASSIC_LEVEL_STEP == 0 {
                self.progress.set_level(irow as f64 / nrow as f64);
            }
        }
        Ok(acc)
    }

    fn chunked<C: RowCollector>(&self, collector: &C, nrow: usize) -> Result<C::Acc, MatchError> {
        let done = AtomicUsize::new(0);
        let mut total = collector.create();
        for range in chunks(nrow, CHUNK_ROWS) {
            let part = self.run_chunk(collector, range, nrow, &done)?;
            total = collector.combine(total, part)?;
        }
        Ok(total)
    }

    fn parallel<C: RowCollector>(
        &self,
        pool: &ThreadPool,
        collector: &C,
        nrow: usize,
        chunk_rows: usize,
    ) -> Result<C::Acc, MatchError> {
        let done = AtomicUsize::new(0);
        let ranges: Vec<Range<usize>> = chunks(nrow, chunk_rows).collect();
        pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| self.run_chunk(collector, range, nrow, &done))
                .try_reduce(|| collector.create(), |a, b| collector.combine(a, b))
        })
    }

    fn run_chunk<C: RowCollector>(
        &self,
        collector: &C,
        range: Range<usize>,
        nrow: usize,
        done: &AtomicUsize,
    ) -> Result<C::Acc, MatchError> {
        let mut acc = collector.create();
        let len = range.len();
        for irow in range {
            self.cancel.check()?;
            collector.accumulate(&mut acc, irow)?;
        }
        let finished = done.fetch_add(len, Ordering::Relaxed) + len;
        self.progress.set_level(finished as f64 / nrow.max(1) as f64);
        Ok(acc)
    }
}

fn chunks(nrow: usize, size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..nrow).step_by(size).map(move |start| start..(start + size).min(nrow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;

    /// Collects row indices, so the combined order is visible.
    struct Rows;

    impl RowCollector for Rows {
        type Acc = Vec<usize>;

        fn create(&self) -> Vec<usize> {
            Vec::new()
        }

        fn accumulate(&self, acc: &mut Vec<usize>, irow: usize) -> Result<(), MatchError> {
            acc.push(irow);
            Ok(())
        }

        fn combine(&self, mut earlier: Vec<usize>, later: Vec<usize>) -> Result<Vec<usize>, MatchError> {
            earlier.extend(later);
            Ok(earlier)
        }
    }

    fn runner(mode: RunnerMode) -> RowRunner {
        RowRunner::new(mode, Some(3), CancelToken::new(), Arc::new(NullProgress)).unwrap()
    }

    #[test]
    fn every_mode_sees_rows_in_order() {
        let want: Vec<usize> = (0..1000).collect();
        for mode in [RunnerMode::Classic, RunnerMode::Sequential, RunnerMode::Parallel, RunnerMode::ParTest] {
            let got = runner(mode).collect("rows", &Rows, 1000).unwrap();
            assert_eq!(got, want, "{mode}");
        }
        assert!(runner(RunnerMode::ParTest).collect("rows", &Rows, 0).unwrap().is_empty());
    }

    #[test]
    fn cancelled_runs_return_nothing() {
        let r = runner(RunnerMode::ParTest);
        r.cancel_token().cancel();
        assert_eq!(r.collect("rows", &Rows, 100), Err(MatchError::Cancelled));
    }

    #[test]
    fn zero_threads_is_a_config_error() {
        let err = RowRunner::new(RunnerMode::Parallel, Some(0), CancelToken::new(), Arc::new(NullProgress))
            .unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(runner(RunnerMode::Classic).threads(), 1);
    }

    #[test]
    fn mode_names() {
        assert_eq!("PARTEST".parse::<RunnerMode>().unwrap(), RunnerMode::ParTest);
        assert_eq!(RunnerMode::Sequential.to_string(), "sequential");
        assert!("threads".parse::<RunnerMode>().is_err());
    }
}
