//! Output for matches within a single table.

use super::{MatchTableBuilder, group_id_column, group_size_column};
use crate::link::{RowLink, RowRef};
use crate::match_error::MatchError;
use crate::table::{FixCols, Table, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What an internal match writes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InternalAction {
    /// Every row, with GroupID and GroupSize columns.
    #[default]
    Identify,
    /// Only rows that belong to no group.
    Keep0,
    /// Ungrouped rows plus the first row of each group.
    Keep1,
    /// One row per group, holding its first `n` rows side by side.
    Wide(usize),
}

impl FromStr for InternalAction {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let bad = || {
            MatchError::Config(format!(
                "unknown internal action `{s}` (identify, keep0, keep1, wide2, wideN)"
            ))
        };
        match lower.as_str() {
            "identify" => Ok(InternalAction::Identify),
            "keep0" => Ok(InternalAction::Keep0),
            "keep1" => Ok(InternalAction::Keep1),
            other => {
                let n: usize = other
                    .strip_prefix("wide")
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(bad)?;
                if n < 2 {
                    return Err(bad());
                }
                Ok(InternalAction::Wide(n))
            }
        }
    }
}

impl fmt::Display for InternalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalAction::Identify => f.write_str("identify"),
            InternalAction::Keep0 => f.write_str("keep0"),
            InternalAction::Keep1 => f.write_str("keep1"),
            InternalAction::Wide(n) => write!(f, "wide{n}"),
        }
    }
}

impl TryFrom<String> for InternalAction {
    type Error = MatchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InternalAction> for String {
    fn from(a: InternalAction) -> String {
        a.to_string()
    }
}

/// Build the output of an internal match of `table`.
///
/// `links` are the groups found in table 0; singleton links are ignored.
/// `fix` and `suffixes` only matter for the wide form, where the same
/// columns appear once per block.
pub fn internal_match_table(
    table: &Table,
    links: &[RowLink],
    action: InternalAction,
    fix: FixCols,
    suffixes: &[String],
) -> Result<Table, MatchError> {
    let groups: Vec<&RowLink> = links.iter().filter(|l| l.len() > 1).collect();

    // (group id, group size) per row, ids counting from 1.
    let mut membership: Vec<Option<(usize, usize)>> = vec![None; table.row_count()];
    for (igroup, link) in groups.iter().enumerate() {
        for r in link.refs_for_table(0) {
            membership[r.row()] = Some((igroup + 1, link.len()));
        }
    }

    let keep_rows = |keep: &dyn Fn(usize) -> bool| -> Result<Table, MatchError> {
        let mut out = Table::new(table.name(), table.columns().to_vec());
        for irow in (0..table.row_count()).filter(|&i| keep(i)) {
            out.push_row(table.row(irow).to_vec())?;
        }
        Ok(out)
    };

    let out = match action {
        InternalAction::Identify => {
            let mut columns = table.columns().to_vec();
            columns.push(group_id_column());
            columns.push(group_size_column());
            let mut out = Table::new(table.name(), columns);
            for (irow, member) in membership.iter().enumerate() {
                let mut row = table.row(irow).to_vec();
                match member {
                    Some((id, size)) => row.extend([Value::Int(*id as i64), Value::Int(*size as i64)]),
                    None => row.extend([Value::Null, Value::Null]),
                }
                out.push_row(row)?;
            }
            out
        }
        InternalAction::Keep0 => keep_rows(&|irow| membership[irow].is_none())?,
        InternalAction::Keep1 => {
            let firsts: Vec<bool> = {
                let mut f = vec![false; table.row_count()];
                for link in &groups {
                    if let Some(first) = link.first() {
                        f[first.row()] = true;
                    }
                }
                f
            };
            keep_rows(&|irow| membership[irow].is_none() || firsts[irow])?
        }
        InternalAction::Wide(n) => {
            // Row k of each group becomes a reference into copy k of the table.
            let wide_links: Vec<RowLink> = groups
                .iter()
                .map(|link| {
                    RowLink::new(
                        link.refs()
                            .iter()
                            .take(n)
                            .enumerate()
                            .map(|(k, r)| RowRef::new(k, r.row())),
                    )
                })
                .collect();
            let copies = vec![table; n];
            let actions = (0..n)
                .map(|k| {
                    let suffix = suffixes.get(k).cloned().unwrap_or_else(|| format!("_{}", k + 1));
                    fix.action(&suffix)
                })
                .collect();
            MatchTableBuilder::new(&copies)
                .with_name(table.name())
                .with_fix_actions(actions)
                .build(&wide_links)?
        }
    };
    log::debug!(
        "internal match ({action}): {} groups, {} output rows",
        groups.len(),
        out.row_count()
    );
    Ok(out)
}
