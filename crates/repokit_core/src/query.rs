//! Declarative query expressions and their SQL translation.
//!
//! # Responsibility
//! - Model filters, projections and sort directives as data, never as
//!   opaque callables.
//! - Compile expressions into parameterized SQL fragments.
//!
//! # Invariants
//! - Every referenced column is validated against the entity descriptor
//!   table before any SQL is produced.
//! - Translated fragments bind all values as parameters; no value is ever
//!   interpolated into SQL text.
//!
//! # See also
//! - docs/architecture/data-access.md

use crate::model::{ColumnKind, ColumnSpec, FieldValue};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter, Write};

/// Sort directive for paged reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Comparison operator of a single column predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Boolean filter expression over one entity's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row; translates to no WHERE clause.
    All,
    Compare {
        column: &'static str,
        op: CompareOp,
        value: FieldValue,
    },
    Like {
        column: &'static str,
        pattern: String,
    },
    IsNull {
        column: &'static str,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: &'static str, value: FieldValue) -> Self {
        Self::Compare {
            column,
            op: CompareOp::Eq,
            value,
        }
    }

    pub fn ne(column: &'static str, value: FieldValue) -> Self {
        Self::Compare {
            column,
            op: CompareOp::Ne,
            value,
        }
    }

    pub fn lt(column: &'static str, value: FieldValue) -> Self {
        Self::Compare {
            column,
            op: CompareOp::Lt,
            value,
        }
    }

    pub fn le(column: &'static str, value: FieldValue) -> Self {
        Self::Compare {
            column,
            op: CompareOp::Le,
            value,
        }
    }

    pub fn gt(column: &'static str, value: FieldValue) -> Self {
        Self::Compare {
            column,
            op: CompareOp::Gt,
            value,
        }
    }

    pub fn ge(column: &'static str, value: FieldValue) -> Self {
        Self::Compare {
            column,
            op: CompareOp::Ge,
            value,
        }
    }

    pub fn like(column: &'static str, pattern: impl Into<String>) -> Self {
        Self::Like {
            column,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(column: &'static str) -> Self {
        Self::IsNull { column }
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// Read-only column selection for projected queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    columns: Vec<&'static str>,
}

impl Projection {
    pub fn columns(columns: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    pub fn column_names(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Raised when an expression cannot be translated to SQL.
///
/// Surfaced at call time, never deferred to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    UnknownColumn { column: String },
    KindMismatch { column: String, expected: ColumnKind },
    /// Ordered or equality comparison against `Null`; use `IsNull` instead.
    NullComparison { column: String },
    EmptyProjection,
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownColumn { column } => {
                write!(f, "column `{column}` is not declared by the entity")
            }
            Self::KindMismatch { column, expected } => write!(
                f,
                "value kind does not match column `{column}` (expected {expected:?})"
            ),
            Self::NullComparison { column } => write!(
                f,
                "cannot compare column `{column}` against null; use an IsNull predicate"
            ),
            Self::EmptyProjection => write!(f, "projection selects no columns"),
        }
    }
}

impl Error for QueryError {}

/// Parameterized SQL produced from one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub text: String,
    pub binds: Vec<FieldValue>,
}

/// Compiles a predicate into a WHERE-clause fragment.
///
/// Returns `None` for `Predicate::All` so callers can omit the clause.
pub fn translate_predicate(
    predicate: &Predicate,
    columns: &[ColumnSpec],
) -> QueryResult<Option<SqlFragment>> {
    if matches!(predicate, Predicate::All) {
        return Ok(None);
    }

    let mut text = String::new();
    let mut binds = Vec::new();
    render_predicate(predicate, columns, &mut text, &mut binds)?;
    Ok(Some(SqlFragment { text, binds }))
}

/// Validates a projection and renders its column list.
pub fn translate_projection(
    projection: &Projection,
    columns: &[ColumnSpec],
) -> QueryResult<String> {
    if projection.is_empty() {
        return Err(QueryError::EmptyProjection);
    }
    for name in projection.column_names() {
        require_column(name, columns)?;
    }
    Ok(projection.column_names().join(", "))
}

/// Validates a sort column against the descriptor table.
pub fn translate_sort_column<'a>(
    column: &'a str,
    columns: &[ColumnSpec],
) -> QueryResult<&'a str> {
    require_column(column, columns)?;
    Ok(column)
}

fn render_predicate(
    predicate: &Predicate,
    columns: &[ColumnSpec],
    text: &mut String,
    binds: &mut Vec<FieldValue>,
) -> QueryResult<()> {
    match predicate {
        // `All` inside a combinator still matches every row.
        Predicate::All => {
            text.push_str("1 = 1");
        }
        Predicate::Compare { column, op, value } => {
            let spec = require_column(column, columns)?;
            if value.is_null() {
                return Err(QueryError::NullComparison {
                    column: (*column).to_string(),
                });
            }
            if !value_fits(value, spec.kind) {
                return Err(QueryError::KindMismatch {
                    column: (*column).to_string(),
                    expected: spec.kind,
                });
            }
            let _ = write!(text, "{column} {} ?", op.sql());
            binds.push(value.clone());
        }
        Predicate::Like { column, pattern } => {
            let spec = require_column(column, columns)?;
            if spec.kind != ColumnKind::Text {
                return Err(QueryError::KindMismatch {
                    column: (*column).to_string(),
                    expected: ColumnKind::Text,
                });
            }
            let _ = write!(text, "{column} LIKE ?");
            binds.push(FieldValue::Text(pattern.clone()));
        }
        Predicate::IsNull { column } => {
            require_column(column, columns)?;
            let _ = write!(text, "{column} IS NULL");
        }
        Predicate::And(left, right) => {
            text.push('(');
            render_predicate(left, columns, text, binds)?;
            text.push_str(" AND ");
            render_predicate(right, columns, text, binds)?;
            text.push(')');
        }
        Predicate::Or(left, right) => {
            text.push('(');
            render_predicate(left, columns, text, binds)?;
            text.push_str(" OR ");
            render_predicate(right, columns, text, binds)?;
            text.push(')');
        }
        Predicate::Not(inner) => {
            text.push_str("NOT (");
            render_predicate(inner, columns, text, binds)?;
            text.push(')');
        }
    }
    Ok(())
}

fn require_column<'a>(name: &str, columns: &'a [ColumnSpec]) -> QueryResult<&'a ColumnSpec> {
    columns
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| QueryError::UnknownColumn {
            column: name.to_string(),
        })
}

fn value_fits(value: &FieldValue, kind: ColumnKind) -> bool {
    matches!(
        (value, kind),
        (FieldValue::Integer(_), ColumnKind::Integer)
            | (FieldValue::Real(_), ColumnKind::Real)
            | (FieldValue::Text(_), ColumnKind::Text)
            | (FieldValue::Blob(_), ColumnKind::Blob)
            | (FieldValue::Boolean(_), ColumnKind::Boolean)
    )
}

#[cfg(test)]
mod tests {
    use super::{
        translate_predicate, translate_projection, translate_sort_column, Predicate, Projection,
        QueryError,
    };
    use crate::model::{ColumnKind, ColumnSpec, FieldValue};

    const COLUMNS: &[ColumnSpec] = &[
        ColumnSpec::new("id", ColumnKind::Integer),
        ColumnSpec::new("name", ColumnKind::Text),
        ColumnSpec::new("score", ColumnKind::Real),
        ColumnSpec::new("vip", ColumnKind::Boolean),
    ];

    #[test]
    fn all_predicate_translates_to_no_clause() {
        let fragment = translate_predicate(&Predicate::All, COLUMNS).unwrap();
        assert!(fragment.is_none());
    }

    #[test]
    fn combinators_render_parenthesized_sql_with_binds() {
        let predicate = Predicate::eq("name", FieldValue::Text("ada".to_string()))
            .and(Predicate::gt("score", FieldValue::Real(2.5)).or(Predicate::is_null("score")))
            .negate();

        let fragment = translate_predicate(&predicate, COLUMNS)
            .unwrap()
            .expect("non-trivial predicate expected");

        assert_eq!(
            fragment.text,
            "NOT ((name = ? AND (score > ? OR score IS NULL)))"
        );
        assert_eq!(
            fragment.binds,
            vec![
                FieldValue::Text("ada".to_string()),
                FieldValue::Real(2.5),
            ]
        );
    }

    #[test]
    fn unknown_column_is_untranslatable() {
        let predicate = Predicate::eq("missing", FieldValue::Integer(1));
        let err = translate_predicate(&predicate, COLUMNS).unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { column } if column == "missing"));
    }

    #[test]
    fn kind_mismatch_and_null_comparison_are_rejected() {
        let mismatch = Predicate::eq("score", FieldValue::Text("high".to_string()));
        assert!(matches!(
            translate_predicate(&mismatch, COLUMNS).unwrap_err(),
            QueryError::KindMismatch { .. }
        ));

        let null_compare = Predicate::ne("name", FieldValue::Null);
        assert!(matches!(
            translate_predicate(&null_compare, COLUMNS).unwrap_err(),
            QueryError::NullComparison { .. }
        ));

        let like_non_text = Predicate::like("id", "1%");
        assert!(matches!(
            translate_predicate(&like_non_text, COLUMNS).unwrap_err(),
            QueryError::KindMismatch { .. }
        ));
    }

    #[test]
    fn projection_requires_declared_columns() {
        let good = Projection::columns(["id", "name"]);
        assert_eq!(translate_projection(&good, COLUMNS).unwrap(), "id, name");

        let empty = Projection::columns([]);
        assert_eq!(
            translate_projection(&empty, COLUMNS).unwrap_err(),
            QueryError::EmptyProjection
        );

        let unknown = Projection::columns(["id", "ghost"]);
        assert!(matches!(
            translate_projection(&unknown, COLUMNS).unwrap_err(),
            QueryError::UnknownColumn { .. }
        ));
    }

    #[test]
    fn sort_column_is_validated() {
        assert_eq!(translate_sort_column("score", COLUMNS).unwrap(), "score");
        assert!(translate_sort_column("ghost", COLUMNS).is_err());
    }
}
