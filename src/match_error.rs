//! MatchError: unified error type for table-xmatch public APIs.
//!
//! Configuration problems are raised before any row is binned, extraction
//! problems before any tuple is materialised. Cancellation and resource
//! exhaustion are reported as their own variants so callers can tell an
//! incomplete run from a broken one.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for cross-match operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    /// The engine selector named something that is not a known engine.
    #[error("Unknown match engine `{name}` (known engines: {known})")]
    UnknownEngine { name: String, known: String },
    /// A tuple expression list does not have the length the engine needs.
    #[error("Match engine `{engine}` needs {expected} tuple values, got {found}")]
    TupleArity {
        engine: String,
        expected: usize,
        found: usize,
    },
    /// Wrong number of match or tuning parameters for an engine.
    #[error("Match engine `{engine}` takes {expected} {kind} parameter(s), got {found}")]
    ParameterCount {
        engine: String,
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    /// A parameter value is out of range (negative, NaN, non-integral...).
    #[error("Bad value {value} for parameter `{name}`: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: &'static str,
    },
    /// Join type name did not parse.
    #[error("Unknown join type `{0}`")]
    InvalidJoinType(String),
    /// Any other configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),
    /// A tuple expression could not be compiled against a table.
    #[error("Bad expression `{expr}` for table {table}: {message}")]
    Expression {
        table: usize,
        expr: String,
        message: String,
    },
    /// A row was added to a table with the wrong number of cells.
    #[error("Row has {found} cells but table `{table}` has {expected} columns")]
    RowShape {
        table: String,
        expected: usize,
        found: usize,
    },
    /// Storage for the bin index or link set could not grow.
    #[error("Out of memory while {0}")]
    ResourceExhausted(String),
    /// Cooperative interruption; no output is produced.
    #[error("Match did not complete: interrupted")]
    Cancelled,
}

impl MatchError {
    /// True for errors detected while validating configuration or
    /// expressions, i.e. before any matching work started.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MatchError::UnknownEngine { .. }
                | MatchError::TupleArity { .. }
                | MatchError::ParameterCount { .. }
                | MatchError::InvalidParameter { .. }
                | MatchError::InvalidJoinType(_)
                | MatchError::Config(_)
                | MatchError::Expression { .. }
        )
    }

    /// True if the run was interrupted rather than failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MatchError::Cancelled)
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, MatchError::ResourceExhausted(_))
    }

    /// Adapter for `try_reserve` failures; `what` names the structure being grown.
    pub(crate) fn exhausted<E: Debug>(what: &str) -> impl FnOnce(E) -> MatchError + '_ {
        move |e| MatchError::ResourceExhausted(format!("growing {what} ({e:?})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_distinct() {
        let cfg = MatchError::InvalidJoinType("3and4".into());
        assert!(cfg.is_config_error());
        assert!(!cfg.is_cancellation());
        assert!(MatchError::Cancelled.is_cancellation());
        assert!(!MatchError::Cancelled.is_config_error());
        let oom = MatchError::ResourceExhausted("binning".into());
        assert!(oom.is_resource_exhausted());
        assert!(!oom.is_config_error());
    }

    #[test]
    fn messages_name_the_problem() {
        let e = MatchError::TupleArity {
            engine: "sky".into(),
            expected: 2,
            found: 3,
        };
        assert_eq!(e.to_string(), "Match engine `sky` needs 2 tuple values, got 3");
    }
}
