//! Turning table rows into match tuples.
//!
//! Full expression languages live outside this crate; the built-in
//! [`ColumnExpressions`] understands column names, `$N` column indices,
//! numeric or quoted literals and `NULL`, which covers the common case of
//! matching on existing columns.

use super::{Tuple, TupleInfo};
use crate::match_error::MatchError;
use crate::table::{Table, Value, ValueKind};

/// Produces the raw tuple values for one row of a table.
pub trait TupleExtractor: Send + Sync {
    /// Number of values produced per row.
    fn arity(&self) -> usize;
    fn extract(&self, table: &Table, irow: usize) -> Vec<Value>;
}

/// One compiled tuple expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpr {
    Column(usize),
    Constant(Value),
}

impl ColumnExpr {
    /// Compile `expr` against the schema of `table`, checking that the
    /// result can feed a tuple slot described by `info`.
    pub fn compile(
        itable: usize,
        table: &Table,
        expr: &str,
        info: &TupleInfo,
    ) -> Result<Self, MatchError> {
        let fail = |message: String| MatchError::Expression {
            table: itable,
            expr: expr.to_owned(),
            message,
        };
        let text = expr.trim();
        if text.is_empty() {
            return Err(fail("empty expression".into()));
        }

        let compiled = if text.eq_ignore_ascii_case("null") {
            ColumnExpr::Constant(Value::Null)
        } else if let Some(index) = text.strip_prefix('$') {
            let n: usize = index
                .parse()
                .map_err(|_| fail(format!("`{index}` is not a column index")))?;
            if n == 0 || n > table.column_count() {
                return Err(fail(format!(
                    "column index ${n} out of range 1..={}",
                    table.column_count()
                )));
            }
            ColumnExpr::Column(n - 1)
        } else if let Some(icol) = table.column_index(text) {
            ColumnExpr::Column(icol)
        } else if let Some(quoted) = unquote(text) {
            ColumnExpr::Constant(Value::Text(quoted.to_owned()))
        } else if let Ok(i) = text.parse::<i64>() {
            ColumnExpr::Constant(Value::Int(i))
        } else if let Ok(x) = text.parse::<f64>() {
            ColumnExpr::Constant(Value::Real(x))
        } else {
            return Err(fail(format!("no column `{text}` in table `{}`", table.name())));
        };

        let kind = match &compiled {
            ColumnExpr::Column(icol) => table.columns()[*icol].kind,
            ColumnExpr::Constant(v) => v.kind().unwrap_or(ValueKind::Any),
        };
        if !kind.fits(info.kind) {
            return Err(fail(format!(
                "{kind:?} value cannot supply {:?} tuple element `{}`",
                info.kind, info.name
            )));
        }
        Ok(compiled)
    }

    fn evaluate(&self, row: &[Value]) -> Value {
        match self {
            ColumnExpr::Column(icol) => row[*icol].clone(),
            ColumnExpr::Constant(v) => v.clone(),
        }
    }
}

fn unquote(text: &str) -> Option<&str> {
    ['\'', '"'].iter().find_map(|&q| {
        text.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

/// Compiled expression list for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnExpressions {
    exprs: Vec<ColumnExpr>,
}

impl ColumnExpressions {
    /// Compile one expression per element of `infos`.
    ///
    /// The count is checked first, so a wrong-length list is reported as a
    /// tuple arity problem rather than a bad expression.
    pub fn compile<S: AsRef<str>>(
        itable: usize,
        table: &Table,
        exprs: &[S],
        infos: &[TupleInfo],
        engine_name: &str,
    ) -> Result<Self, MatchError> {
        if exprs.len() != infos.len() {
            return Err(MatchError::TupleArity {
                engine: engine_name.to_owned(),
                expected: infos.len(),
                found: exprs.len(),
            });
        }
        let exprs = exprs
            .iter()
            .zip(infos)
            .map(|(e, info)| ColumnExpr::compile(itable, table, e.as_ref(), info))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exprs })
    }

    pub fn exprs(&self) -> &[ColumnExpr] {
        &self.exprs
    }
}

impl TupleExtractor for ColumnExpressions {
    fn arity(&self) -> usize {
        self.exprs.len()
    }

    fn extract(&self, table: &Table, irow: usize) -> Vec<Value> {
        let row = table.row(irow);
        self.exprs.iter().map(|e| e.evaluate(row)).collect()
    }
}

/// Extract every row of `table` up front, passing each raw value list
/// through `prepare` (which converts it to the engine's native units).
pub fn extract_tuples<E, F>(table: &Table, extractor: &E, prepare: F) -> Result<Vec<Tuple>, MatchError>
where
    E: TupleExtractor + ?Sized,
    F: Fn(Vec<Value>) -> Tuple,
{
    let mut tuples = Vec::new();
    tuples
        .try_reserve_exact(table.row_count())
        .map_err(MatchError::exhausted("tuple storage"))?;
    for irow in 0..table.row_count() {
        tuples.push(prepare(extractor.extract(table, irow)));
    }
    Ok(tuples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnInfo;
    use crate::tuple::AngleRole;

    fn table() -> Table {
        Table::from_rows(
            "cat",
            vec![
                ColumnInfo::new("RA", ValueKind::Number),
                ColumnInfo::new("Dec", ValueKind::Number),
                ColumnInfo::new("Name", ValueKind::Text),
            ],
            vec![vec![Value::Real(10.0), Value::Real(-5.0), Value::from("star")]],
        )
        .unwrap()
    }

    fn sky_infos() -> Vec<TupleInfo> {
        vec![
            TupleInfo::angle("RA", "Right ascension", AngleRole::Position),
            TupleInfo::angle("Dec", "Declination", AngleRole::Position),
        ]
    }

    #[test]
    fn names_indices_and_literals() {
        let t = table();
        let ex = ColumnExpressions::compile(0, &t, &["ra", "$2"], &sky_infos(), "sky").unwrap();
        assert_eq!(ex.exprs(), &[ColumnExpr::Column(0), ColumnExpr::Column(1)]);
        assert_eq!(ex.extract(&t, 0), vec![Value::Real(10.0), Value::Real(-5.0)]);

        let ex = ColumnExpressions::compile(0, &t, &["RA", "0.5"], &sky_infos(), "sky").unwrap();
        assert_eq!(ex.extract(&t, 0)[1], Value::Real(0.5));
    }

    #[test]
    fn unknown_column_is_expression_error() {
        let err = ColumnExpressions::compile(1, &table(), &["RA", "DEJ2000"], &sky_infos(), "sky")
            .unwrap_err();
        assert!(matches!(err, MatchError::Expression { table: 1, .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn text_into_numeric_slot_rejected() {
        let err = ColumnExpressions::compile(0, &table(), &["Name", "Dec"], &sky_infos(), "sky")
            .unwrap_err();
        assert!(matches!(err, MatchError::Expression { .. }));
    }

    #[test]
    fn arity_checked_before_expressions() {
        let err = ColumnExpressions::compile(0, &table(), &["nope"], &sky_infos(), "sky").unwrap_err();
        assert!(matches!(err, MatchError::TupleArity { expected: 2, found: 1, .. }));
    }

    #[test]
    fn text_slot_accepts_quoted_constant() {
        let infos = vec![TupleInfo::any("Key", "Matched value")];
        let ex = ColumnExpressions::compile(0, &table(), &["'abc'"], &infos, "exact").unwrap();
        assert_eq!(ex.extract(&table(), 0), vec![Value::from("abc")]);
    }
}
