//! Match configuration and the task that runs it against tables.
//!
//! A [`MatchConfig`] is plain data (serde-loadable, every field defaulted).
//! [`MatchTask::new`] turns it into a validated engine, so every
//! configuration problem surfaces before any table is looked at. The task
//! then compiles the tuple expressions for all input tables, extracts the
//! tuples, runs the [`RowMatcher`] and builds the output [`Table`].

use crate::engine::{EngineOps, MatchEngine};
use crate::link::RowLink;
use crate::match_error::MatchError;
use crate::matcher::{JoinType, MultiJoinType, PairMode, RowMatcher, RowRunner, RunnerMode};
use crate::output::{InternalAction, MatchTableBuilder, internal_match_table};
use crate::pixel::PixellatorKind;
use crate::progress::{CancelToken, ProgressIndicator, ProgressMode, ProgressState};
use crate::table::{ColumnInfo, FixCols, JoinFixAction, Table, ValueKind};
use crate::tuple::{ColumnExpressions, Tuple, extract_tuples};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How more than two tables are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiMode {
    /// Pair matches of every table against one reference table.
    #[default]
    Pairs,
    /// Transitive groups with no privileged table.
    Group,
}

impl FromStr for MultiMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pairs" => Ok(MultiMode::Pairs),
            "group" => Ok(MultiMode::Group),
            _ => Err(MatchError::Config(format!("unknown multi mode `{s}` (pairs, group)"))),
        }
    }
}

impl fmt::Display for MultiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MultiMode::Pairs => "pairs",
            MultiMode::Group => "group",
        })
    }
}

/// Everything a match run needs apart from the tables themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Engine selector, e.g. `sky`, `2d` or `sky+1d`.
    pub engine: String,
    pub params: Vec<f64>,
    /// Empty means engine defaults.
    pub tuning: Vec<f64>,
    /// Angles in degrees and arcseconds rather than radians.
    pub human_units: bool,
    pub pixellator: PixellatorKind,
    pub join: JoinType,
    pub find: PairMode,
    pub multi_mode: MultiMode,
    /// Reference table for multi-table pairs mode (0-based).
    pub reference: usize,
    /// Per-table rules for multi-table matches; empty means all `default`.
    pub multi_join: Vec<MultiJoinType>,
    pub internal_action: InternalAction,
    pub fixcols: FixCols,
    /// Per-table suffixes for renamed columns; missing ones are `_1`, `_2`, ...
    pub suffixes: Vec<String>,
    /// Name of the score column; `None` leaves it out.
    pub score_column: Option<String>,
    pub add_groups: bool,
    pub progress: ProgressMode,
    pub runner: RunnerMode,
    pub threads: Option<usize>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            engine: "sky".into(),
            params: Vec::new(),
            tuning: Vec::new(),
            human_units: true,
            pixellator: PixellatorKind::Healpix,
            join: JoinType::OneAndTwo,
            find: PairMode::Best,
            multi_mode: MultiMode::Pairs,
            reference: 0,
            multi_join: Vec::new(),
            internal_action: InternalAction::Identify,
            fixcols: FixCols::Dups,
            suffixes: Vec::new(),
            score_column: Some("Separation".into()),
            add_groups: false,
            progress: ProgressMode::None,
            runner: RunnerMode::Parallel,
            threads: None,
        }
    }
}

impl MatchConfig {
    /// Config for `engine` with the given match parameters, otherwise default.
    pub fn new(engine: impl Into<String>, params: &[f64]) -> Self {
        Self {
            engine: engine.into(),
            params: params.to_vec(),
            ..Self::default()
        }
    }

    fn suffix(&self, itable: usize) -> String {
        self.suffixes
            .get(itable)
            .cloned()
            .unwrap_or_else(|| format!("_{}", itable + 1))
    }

    fn fix_actions(&self, ntable: usize) -> Vec<JoinFixAction> {
        (0..ntable).map(|i| self.fixcols.action(&self.suffix(i))).collect()
    }

    /// Engine built and configured from this config.
    pub fn build_engine(&self) -> Result<MatchEngine, MatchError> {
        MatchEngine::parse(&self.engine, self.pixellator, self.human_units)?.configure(&self.params, &self.tuning)
    }
}

/// A validated, ready-to-run match.
#[derive(Debug)]
pub struct MatchTask {
    config: MatchConfig,
    engine: MatchEngine,
    cancel: CancelToken,
    state: Arc<ProgressState>,
}

impl MatchTask {
    /// Validate `config` and build its engine; no table is touched.
    pub fn new(config: MatchConfig) -> Result<Self, MatchError> {
        let engine = config.build_engine()?;
        if config.threads == Some(0) {
            return Err(MatchError::Config("thread limit must be at least 1".into()));
        }
        if config.score_column.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(MatchError::Config("score column name is empty".into()));
        }
        log::debug!("configured {}", engine.describe());
        let state = Arc::new(ProgressState::new(config.progress.indicator()));
        Ok(Self {
            config,
            engine,
            cancel: CancelToken::new(),
            state,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    /// Token that stops this task's runs at the next row.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Live progress, pollable from another thread.
    pub fn progress(&self) -> Arc<ProgressState> {
        Arc::clone(&self.state)
    }

    fn runner(&self) -> Result<RowRunner, MatchError> {
        let progress: Arc<dyn ProgressIndicator> = self.state.clone();
        RowRunner::new(self.config.runner, self.config.threads, self.cancel.clone(), progress)
    }

    /// Compile every table's expressions first, then extract, so a bad
    /// expression for the last table is reported before any row is read.
    fn tuples<S: AsRef<str>>(&self, tables: &[&Table], exprs: &[&[S]]) -> Result<Vec<Vec<Tuple>>, MatchError> {
        if exprs.len() != tables.len() {
            return Err(MatchError::Config(format!(
                "{} expression lists given for {} tables",
                exprs.len(),
                tables.len()
            )));
        }
        let infos = self.engine.tuple_infos();
        let name = self.engine.name();
        let compiled = tables
            .iter()
            .zip(exprs)
            .enumerate()
            .map(|(i, (table, ex))| ColumnExpressions::compile(i, table, ex, &infos, &name))
            .collect::<Result<Vec<_>, _>>()?;
        tables
            .iter()
            .zip(&compiled)
            .map(|(table, ex)| {
                self.cancel.check()?;
                extract_tuples(table, ex, |values| self.engine.prepare(values))
            })
            .collect()
    }

    fn matcher<S: AsRef<str>>(&self, tables: &[&Table], exprs: &[&[S]]) -> Result<RowMatcher, MatchError> {
        let tuples = self.tuples(tables, exprs)?;
        RowMatcher::new(self.engine.clone(), tuples, self.runner()?)
    }

    fn score_column(&self) -> Option<ColumnInfo> {
        let name = self.config.score_column.as_deref()?;
        let info = self.engine.score_info()?;
        let mut col = ColumnInfo::new(name, ValueKind::Number).with_description(info.description);
        col.unit = info.unit;
        Some(col)
    }

    fn finish<T>(&self, result: Result<T, MatchError>) -> Result<T, MatchError> {
        match &result {
            Ok(_) => self.state.finish(),
            Err(e) if e.is_cancellation() => log::warn!("match interrupted"),
            Err(e) => log::error!("match failed: {e}"),
        }
        result
    }

    /// Links of a two-table match, after the join type is applied.
    pub fn pair_links<S: AsRef<str>>(
        &self,
        t1: &Table,
        t2: &Table,
        exprs1: &[S],
        exprs2: &[S],
    ) -> Result<Vec<RowLink>, MatchError> {
        let matcher = self.matcher(&[t1, t2], &[exprs1, exprs2])?;
        let pairs = matcher.find_pair_matches(self.config.find)?;
        Ok(self
            .config
            .join
            .process_links(pairs, [t1.row_count(), t2.row_count()]))
    }

    /// Two-table match.
    pub fn pair_match<S: AsRef<str>>(
        &self,
        t1: &Table,
        t2: &Table,
        exprs1: &[S],
        exprs2: &[S],
    ) -> Result<Table, MatchError> {
        let result = self.pair_links(t1, t2, exprs1, exprs2).and_then(|links| {
            let join = self.config.join;
            let score = if join.has_scores() { self.score_column() } else { None };
            let groups = self.config.add_groups && self.config.find == PairMode::All;
            MatchTableBuilder::new(&[t1, t2])
                .with_used(&join.used_tables())
                .with_fix_actions(self.config.fix_actions(2))
                .with_score_column(score)
                .with_groups(groups)
                .build(&links)
        });
        self.finish(result)
    }

    fn multi_join_types(&self, ntable: usize) -> Result<Vec<MultiJoinType>, MatchError> {
        match self.config.multi_join.len() {
            0 => Ok(vec![MultiJoinType::Default; ntable]),
            n if n == ntable => Ok(self.config.multi_join.clone()),
            n => Err(MatchError::Config(format!("{n} join types given for {ntable} tables"))),
        }
    }

    /// Links of an N-table match in the configured multi mode.
    pub fn multi_links<S: AsRef<str>>(&self, tables: &[&Table], exprs: &[&[S]]) -> Result<Vec<RowLink>, MatchError> {
        let join_types = self.multi_join_types(tables.len())?;
        let matcher = self.matcher(tables, exprs)?;
        match self.config.multi_mode {
            MultiMode::Pairs => {
                let best_only = self.config.find != PairMode::All;
                matcher.find_multi_pair_matches(self.config.reference, best_only, &join_types)
            }
            MultiMode::Group => matcher.find_group_matches(&join_types),
        }
    }

    /// N-table match; tables that no output row mentions still contribute
    /// (all-null) columns.
    pub fn multi_match<S: AsRef<str>>(&self, tables: &[&Table], exprs: &[&[S]]) -> Result<Table, MatchError> {
        let result = self.multi_links(tables, exprs).and_then(|links| {
            MatchTableBuilder::new(tables)
                .with_fix_actions(self.config.fix_actions(tables.len()))
                .build(&links)
        });
        self.finish(result)
    }

    /// Groups of matching rows within one table.
    pub fn internal_links<S: AsRef<str>>(&self, table: &Table, exprs: &[S]) -> Result<Vec<RowLink>, MatchError> {
        let matcher = self.matcher(&[table], &[exprs])?;
        matcher.find_internal_matches(false)
    }

    /// Internal match, written out per the configured [`InternalAction`].
    pub fn internal_match<S: AsRef<str>>(&self, table: &Table, exprs: &[S]) -> Result<Table, MatchError> {
        let result = self.internal_links(table, exprs).and_then(|links| {
            internal_match_table(
                table,
                &links,
                self.config.internal_action,
                self.config.fixcols,
                &self.config.suffixes,
            )
        });
        self.finish(result)
    }
}
