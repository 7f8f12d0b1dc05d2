use static_assertions::{assert_eq_size, assert_impl_all};
use std::fmt;

/// Identifies one row of one input table.
///
/// Ordering is by table index, then row index; this is the canonical order
/// used to sort link output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowRef {
    table: u32,
    row: u64,
}

assert_impl_all!(RowRef: Copy, Send, Sync, Ord, std::hash::Hash);
assert_eq_size!(RowRef, [u64; 2]);

impl RowRef {
    #[inline]
    pub fn new(table: usize, row: usize) -> Self {
        Self {
            table: table as u32,
            row: row as u64,
        }
    }

    #[inline]
    pub fn table(&self) -> usize {
        self.table as usize
    }

    #[inline]
    pub fn row(&self) -> usize {
        self.row as usize
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_table_then_row() {
        let mut refs = vec![RowRef::new(1, 0), RowRef::new(0, 9), RowRef::new(0, 2)];
        refs.sort();
        assert_eq!(refs, vec![RowRef::new(0, 2), RowRef::new(0, 9), RowRef::new(1, 0)]);
        assert_eq!(RowRef::new(3, 4).to_string(), "3:4");
    }
}
