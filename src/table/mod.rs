//! Minimal in-memory tables: the input and output of the task layer.
//!
//! File formats stay outside this crate; anything that can produce rows of
//! [`Value`]s with a [`ColumnInfo`] schema can be matched.

pub mod column;
pub mod fix;
pub mod value;

pub use column::ColumnInfo;
pub use fix::{FixCols, JoinFixAction, fix_column_names};
pub use value::{Value, ValueKind};

use crate::match_error::MatchError;
use serde::{Deserialize, Serialize};

/// Row-major table of typed cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from literal rows, checking each row's width.
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<ColumnInfo>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<Self, MatchError> {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), MatchError> {
        if row.len() != self.columns.len() {
            return Err(MatchError::RowShape {
                table: self.name.clone(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows
            .try_reserve(1)
            .map_err(MatchError::exhausted("table rows"))?;
        self.rows.push(row);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, irow: usize) -> &[Value] {
        &self.rows[irow]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[Value]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn cell(&self, irow: usize, icol: usize) -> &Value {
        &self.rows[irow][icol]
    }

    /// Case-insensitive column lookup; an exact-case match wins over others.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, icol: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |r| &r[icol])
    }
}
