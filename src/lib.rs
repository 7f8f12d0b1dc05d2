#![cfg_attr(docsrs, feature(doc_cfg))]
//! # table-xmatch
//!
//! table-xmatch links rows of one or more tables that describe the same
//! object: sources in two sky catalogues within an angular tolerance,
//! points within a Cartesian distance, rows sharing an exact key, or any
//! combination of these.
//!
//! ## Pipeline
//! - A [`MatchEngine`](engine::MatchEngine) turns each row's
//!   [`Tuple`](tuple::Tuple) into bin keys and scores pairs of tuples.
//! - The [`RowMatcher`](matcher::RowMatcher) bins every row, scores only
//!   rows that share a bin, and consolidates matching pairs into
//!   [`RowLink`](link::RowLink)s (pair, multi-pair, group or internal).
//! - The [`output`] builders turn links back into a [`Table`](table::Table)
//!   according to the join type.
//! - [`MatchTask`](config::MatchTask) drives all of this from a
//!   serde-loadable [`MatchConfig`](config::MatchConfig).
//!
//! ## Determinism
//!
//! Scoring is symmetric, candidate lists are sorted, and every link list
//! leaves the crate in canonical order, so the classic, sequential and
//! parallel runners produce identical tables. Ties on score go to the
//! lowest row index.
//!
//! ## Observability
//! The crate logs through the `log` facade and reports progress through an
//! explicit [`ProgressIndicator`](progress::ProgressIndicator); it installs
//! no logger of its own.

pub mod config;
pub mod debug_invariants;
pub mod engine;
pub mod link;
pub mod match_error;
pub mod matcher;
pub mod output;
pub mod pixel;
pub mod progress;
pub mod table;
pub mod tuple;
pub mod util;

pub use debug_invariants::DebugInvariants;

/// The most-used types in one import.
pub mod prelude {
    pub use crate::config::{MatchConfig, MatchTask, MultiMode};
    pub use crate::engine::{EngineOps, MatchEngine, known_engines};
    pub use crate::link::{LinkSet, RowLink, RowRef};
    pub use crate::match_error::MatchError;
    pub use crate::matcher::{JoinType, MultiJoinType, PairMode, RowMatcher, RowRunner, RunnerMode};
    pub use crate::output::{InternalAction, MatchTableBuilder};
    pub use crate::pixel::PixellatorKind;
    pub use crate::progress::{CancelToken, ProgressIndicator, ProgressMode, ProgressState};
    pub use crate::table::{ColumnInfo, FixCols, Table, Value, ValueKind};
    pub use crate::tuple::{Tuple, TupleInfo};
}
