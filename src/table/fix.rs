//! Duplicate column-name resolution for joined tables.

use super::column::ColumnInfo;
use crate::match_error::MatchError;
use crate::util::FastSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which columns of a joined table get renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixCols {
    None,
    #[default]
    Dups,
    All,
}

impl FixCols {
    pub fn action(self, suffix: &str) -> JoinFixAction {
        match self {
            FixCols::None => JoinFixAction::NoAction,
            FixCols::Dups => JoinFixAction::RenameDuplicates(suffix.to_owned()),
            FixCols::All => JoinFixAction::RenameAll(suffix.to_owned()),
        }
    }
}

impl FromStr for FixCols {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(FixCols::None),
            "dups" => Ok(FixCols::Dups),
            "all" => Ok(FixCols::All),
            _ => Err(MatchError::Config(format!(
                "unknown fixcols value `{s}` (none, dups, all)"
            ))),
        }
    }
}

impl fmt::Display for FixCols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FixCols::None => "none",
            FixCols::Dups => "dups",
            FixCols::All => "all",
        })
    }
}

/// What to do with the column names of one input table in a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinFixAction {
    NoAction,
    /// Append the suffix to names that occur elsewhere in the output.
    RenameDuplicates(String),
    /// Append the suffix to every name.
    RenameAll(String),
}

impl JoinFixAction {
    fn apply(&self, name: &str, duplicated: bool) -> String {
        match self {
            JoinFixAction::RenameAll(suffix) => format!("{name}{suffix}"),
            JoinFixAction::RenameDuplicates(suffix) if duplicated => format!("{name}{suffix}"),
            _ => name.to_owned(),
        }
    }
}

/// Rename the columns of several tables that are about to be placed side by side.
///
/// Duplicates are detected case-insensitively over the whole output schema.
/// After the per-table actions are applied, any name that still collides
/// with an earlier one gets a numeric `_N` tail, so the result is always
/// unique.
pub fn fix_column_names(
    column_sets: &[&[ColumnInfo]],
    actions: &[JoinFixAction],
) -> Vec<Vec<ColumnInfo>> {
    let mut counts = crate::util::FastMap::<String, usize>::default();
    for col in column_sets.iter().flat_map(|cols| cols.iter()) {
        *counts.entry(col.name.to_lowercase()).or_default() += 1;
    }

    let mut taken = FastSet::<String>::default();
    let mut out = Vec::with_capacity(column_sets.len());
    for (it, cols) in column_sets.iter().enumerate() {
        let action = actions.get(it).unwrap_or(&JoinFixAction::NoAction);
        let mut fixed = Vec::with_capacity(cols.len());
        for col in cols.iter() {
            let duplicated = counts[&col.name.to_lowercase()] > 1;
            let base = action.apply(&col.name, duplicated);
            let mut name = base.clone();
            let mut n = 1;
            while !taken.insert(name.to_lowercase()) {
                n += 1;
                name = format!("{base}_{n}");
            }
            fixed.push(col.renamed(name));
        }
        out.push(fixed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ValueKind;

    fn cols(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .map(|n| ColumnInfo::new(*n, ValueKind::Number))
            .collect()
    }

    fn names(fixed: &[Vec<ColumnInfo>]) -> Vec<Vec<String>> {
        fixed
            .iter()
            .map(|c| c.iter().map(|c| c.name.clone()).collect())
            .collect()
    }

    #[test]
    fn duplicates_get_suffixes() {
        let a = cols(&["id", "RA", "mag"]);
        let b = cols(&["ID", "ra", "flux"]);
        let fixed = fix_column_names(
            &[&a, &b],
            &[FixCols::Dups.action("_1"), FixCols::Dups.action("_2")],
        );
        assert_eq!(
            names(&fixed),
            vec![
                vec!["id_1", "RA_1", "mag"],
                vec!["ID_2", "ra_2", "flux"],
            ]
        );
    }

    #[test]
    fn unresolved_clash_gets_counter() {
        let a = cols(&["x"]);
        let b = cols(&["x"]);
        let fixed = fix_column_names(&[&a, &b], &[JoinFixAction::NoAction, JoinFixAction::NoAction]);
        assert_eq!(names(&fixed), vec![vec!["x"], vec!["x_2"]]);
    }

    #[test]
    fn rename_all_touches_unique_names() {
        let a = cols(&["x"]);
        let b = cols(&["y"]);
        let fixed = fix_column_names(&[&a, &b], &[FixCols::All.action("_a"), FixCols::None.action("_b")]);
        assert_eq!(names(&fixed), vec![vec!["x_a"], vec!["y"]]);
    }
}
