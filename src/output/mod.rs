//! Output tables built from consolidated links.
//!
//! A join table has one row per link. Each contributing input table
//! supplies a block of columns, filled from the link's row in that table or
//! with nulls if the link has none. Optional trailing columns carry the
//! pair score and the GroupID/GroupSize of links that share rows.

pub mod internal;

pub use internal::{InternalAction, internal_match_table};

use crate::link::{DisjointSet, RowLink, RowRef};
use crate::match_error::MatchError;
use crate::table::{ColumnInfo, JoinFixAction, Table, Value, ValueKind, fix_column_names};
use crate::util::FastMap;

pub const GROUP_ID: &str = "GroupID";
pub const GROUP_SIZE: &str = "GroupSize";

pub(crate) fn group_id_column() -> ColumnInfo {
    ColumnInfo::new(GROUP_ID, ValueKind::Number).with_description("Identifier for the match group")
}

pub(crate) fn group_size_column() -> ColumnInfo {
    ColumnInfo::new(GROUP_SIZE, ValueKind::Number).with_description("Number of rows in the match group")
}

/// Assembles the joined output table for a list of links.
#[derive(Debug, Clone)]
pub struct MatchTableBuilder<'a> {
    name: String,
    tables: Vec<&'a Table>,
    used: Vec<bool>,
    actions: Vec<JoinFixAction>,
    score: Option<ColumnInfo>,
    add_groups: bool,
}

impl<'a> MatchTableBuilder<'a> {
    /// Builder joining all of `tables`, with no renaming and no extra columns.
    pub fn new(tables: &[&'a Table]) -> Self {
        Self {
            name: "match".into(),
            tables: tables.to_vec(),
            used: vec![true; tables.len()],
            actions: vec![JoinFixAction::NoAction; tables.len()],
            score: None,
            add_groups: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Which tables contribute columns; unused tables are skipped entirely.
    pub fn with_used(mut self, used: &[bool]) -> Self {
        for (slot, &u) in self.used.iter_mut().zip(used) {
            *slot = u;
        }
        self
    }

    pub fn with_fix_actions(mut self, actions: Vec<JoinFixAction>) -> Self {
        self.actions = actions;
        self
    }

    /// Append a column holding each link's score (null where it has none).
    pub fn with_score_column(mut self, column: Option<ColumnInfo>) -> Self {
        self.score = column;
        self
    }

    /// Append GroupID and GroupSize columns.
    pub fn with_groups(mut self, add_groups: bool) -> Self {
        self.add_groups = add_groups;
        self
    }

    /// Output schema for `links`: fixed column names, with columns made
    /// nullable wherever some link lacks their table.
    fn schema(&self, links: &[RowLink]) -> (Vec<usize>, Vec<ColumnInfo>) {
        let used: Vec<usize> = (0..self.tables.len()).filter(|&t| self.used[t]).collect();
        let mut extra = Vec::new();
        if let Some(score) = &self.score {
            extra.push(score.clone().with_nullable(true));
        }
        if self.add_groups {
            extra.push(group_id_column());
            extra.push(group_size_column());
        }

        let sets: Vec<&[ColumnInfo]> = used
            .iter()
            .map(|&t| self.tables[t].columns())
            .chain(std::iter::once(extra.as_slice()))
            .collect();
        let mut actions: Vec<JoinFixAction> = used
            .iter()
            .map(|&t| self.actions.get(t).cloned().unwrap_or(JoinFixAction::NoAction))
            .collect();
        actions.push(JoinFixAction::NoAction);
        let fixed = fix_column_names(&sets, &actions);

        let mut columns = Vec::new();
        for (block, &t) in fixed.iter().zip(&used) {
            let blanks = links.iter().any(|l| l.ref_for_table(t).is_none());
            columns.extend(block.iter().map(|c| {
                let nullable = c.nullable || blanks;
                c.clone().with_nullable(nullable)
            }));
        }
        if let Some(last) = fixed.last() {
            columns.extend(last.iter().cloned());
        }
        (used, columns)
    }

    pub fn build(&self, links: &[RowLink]) -> Result<Table, MatchError> {
        let (used, columns) = self.schema(links);
        let groups = if self.add_groups { link_groups(links) } else { Vec::new() };
        let width = columns.len();
        let mut out = Table::new(self.name.clone(), columns);

        for (ilink, link) in links.iter().enumerate() {
            let mut row = Vec::new();
            row.try_reserve_exact(width)
                .map_err(MatchError::exhausted("output row"))?;
            for &t in &used {
                let table = self.tables[t];
                match link.ref_for_table(t) {
                    Some(r) => row.extend_from_slice(table.row(r.row())),
                    None => row.resize(row.len() + table.column_count(), Value::Null),
                }
            }
            if self.score.is_some() {
                row.push(match link.score() {
                    Some(s) if !s.is_nan() => Value::Real(s),
                    _ => Value::Null,
                });
            }
            if self.add_groups {
                match groups[ilink] {
                    Some((id, size)) => {
                        row.push(Value::Int(id as i64));
                        row.push(Value::Int(size as i64));
                    }
                    None => row.extend([Value::Null, Value::Null]),
                }
            }
            out.push_row(row)?;
        }
        log::debug!("output table `{}`: {} rows", out.name(), out.row_count());
        Ok(out)
    }
}

/// For each link, the (id, size) of its group of links connected through
/// shared rows, or `None` if it shares no row with any other link.
///
/// Ids count from 1 in order of first appearance.
pub fn link_groups(links: &[RowLink]) -> Vec<Option<(usize, usize)>> {
    let mut sets = DisjointSet::new(links.len());
    let mut owner: FastMap<RowRef, u32> = FastMap::default();
    for (ilink, link) in links.iter().enumerate() {
        for &r in link.refs() {
            match owner.get(&r) {
                Some(&other) => {
                    sets.union(other, ilink as u32);
                }
                None => {
                    owner.insert(r, ilink as u32);
                }
            }
        }
    }

    let roots: Vec<u32> = (0..links.len() as u32).map(|i| sets.find(i)).collect();
    let mut sizes: FastMap<u32, usize> = FastMap::default();
    for &root in &roots {
        *sizes.entry(root).or_default() += 1;
    }
    let mut ids: FastMap<u32, usize> = FastMap::default();
    roots
        .iter()
        .map(|root| {
            let size = sizes[root];
            (size > 1).then(|| {
                let next = ids.len() + 1;
                (*ids.entry(*root).or_insert(next), size)
            })
        })
        .collect()
}
