//! # mssql-pushdown
//!
//! Recursive translator from a host query engine's bound expression tree
//! into T-SQL `WHERE`/projection fragments, with partial pushdown for `AND`
//! and all-or-nothing pushdown for `OR`.
//!
//! The translator never fails outright: every expression either renders to
//! SQL or is reported as unsupported via [`Translated::fully_supported`], so
//! the caller can always fall back to re-evaluating a predicate locally
//! against the (possibly over-fetched) rows SQL Server returns.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod expr;
pub mod functions;
pub mod translate;

pub use error::PushdownError;
pub use expr::{ArithOp, ColumnResolver, CompareOp, Expr, TableFilterSet};
pub use translate::{translate, translate_filter_set, Translated};

#[cfg(test)]
mod tests {
    use super::*;
    use mssql_types::SqlValue;

    fn resolver<'a>(all_columns: &'a [String], projection: &'a [usize]) -> ColumnResolver<'a> {
        ColumnResolver::new(all_columns, projection)
    }

    #[test]
    fn simple_equality_is_fully_pushed_down() {
        let cols = vec!["id".to_string(), "status".to_string()];
        let proj = vec![0, 1];
        let resolver = resolver(&cols, &proj);

        let expr = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Column(1)),
            right: Box::new(Expr::Literal(SqlValue::String("open".to_string()))),
        };
        let t = translate(&expr, &resolver);
        assert!(t.fully_supported);
        assert_eq!(t.sql_fragment.unwrap(), "[status] = N'open'");
    }

    #[test]
    fn and_with_unsupported_conjunct_pushes_the_supported_half() {
        let cols = vec!["id".to_string(), "name".to_string()];
        let proj = vec![0, 1];
        let resolver = resolver(&cols, &proj);

        let supported = Expr::Compare {
            op: CompareOp::Gt,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Literal(SqlValue::Int(10))),
        };
        // `replace` is not whitelisted, so this conjunct cannot be pushed.
        let unsupported = Expr::Call {
            name: "replace".to_string(),
            args: vec![
                Expr::Column(1),
                Expr::Literal(SqlValue::String("a".to_string())),
                Expr::Literal(SqlValue::String("b".to_string())),
            ],
        };
        let expr = Expr::And(vec![supported, unsupported]);
        let t = translate(&expr, &resolver);

        assert!(!t.fully_supported);
        assert_eq!(t.sql_fragment.unwrap(), "[id] > 10");
    }

    #[test]
    fn or_with_one_unsupported_branch_rejects_the_whole_expression() {
        let cols = vec!["id".to_string()];
        let proj = vec![0];
        let resolver = resolver(&cols, &proj);

        let supported = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Literal(SqlValue::Int(1))),
        };
        let unsupported = Expr::Call {
            name: "concat".to_string(),
            args: vec![Expr::Column(0)],
        };
        let expr = Expr::Or(vec![supported, unsupported]);
        let t = translate(&expr, &resolver);

        assert!(t.sql_fragment.is_none());
        assert!(!t.fully_supported);
    }

    #[test]
    fn prefix_decomposes_to_like_with_escaping() {
        let cols = vec!["sku".to_string()];
        let proj = vec![0];
        let resolver = resolver(&cols, &proj);

        let expr = Expr::Call {
            name: "prefix".to_string(),
            args: vec![
                Expr::Column(0),
                Expr::Literal(SqlValue::String("A_100%".to_string())),
            ],
        };
        let t = translate(&expr, &resolver);
        assert!(t.fully_supported);
        assert_eq!(t.sql_fragment.unwrap(), "[sku] LIKE N'A[_]100[%]%'");
    }

    #[test]
    fn icontains_wraps_both_sides_in_lower() {
        let cols = vec!["name".to_string()];
        let proj = vec![0];
        let resolver = resolver(&cols, &proj);

        let expr = Expr::Call {
            name: "icontains".to_string(),
            args: vec![
                Expr::Column(0),
                Expr::Literal(SqlValue::String("Bob".to_string())),
            ],
        };
        let t = translate(&expr, &resolver);
        assert!(t.fully_supported);
        assert_eq!(
            t.sql_fragment.unwrap(),
            "LOWER([name]) LIKE N'%bob%'"
        );
    }

    #[test]
    fn unresolvable_column_is_unsupported() {
        let cols = vec!["id".to_string()];
        let proj = vec![0];
        let resolver = resolver(&cols, &proj);

        let expr = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Column(5)),
            right: Box::new(Expr::Literal(SqlValue::Int(1))),
        };
        let t = translate(&expr, &resolver);
        assert!(!t.fully_supported);
        assert!(t.sql_fragment.is_none());
    }

    #[test]
    fn in_list_renders_constant_list() {
        let cols = vec!["status".to_string()];
        let proj = vec![0];
        let resolver = resolver(&cols, &proj);

        let expr = Expr::In {
            expr: Box::new(Expr::Column(0)),
            values: vec![
                SqlValue::String("open".to_string()),
                SqlValue::String("closed".to_string()),
            ],
        };
        let t = translate(&expr, &resolver);
        assert!(t.fully_supported);
        assert_eq!(t.sql_fragment.unwrap(), "[status] IN (N'open', N'closed')");
    }

    #[test]
    fn empty_filter_set_needs_no_where_clause() {
        let cols = vec!["id".to_string()];
        let proj = vec![0];
        let resolver = resolver(&cols, &proj);
        let t = translate_filter_set(&TableFilterSet::new(), &resolver);
        assert!(t.fully_supported);
        assert!(t.sql_fragment.is_none());
    }
}
