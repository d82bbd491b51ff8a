//! Recursive translation of a bound [`Expr`] tree into a T-SQL fragment.

use mssql_types::{bracket_identifier, sql_literal, SqlValue};
use tracing::trace;

use crate::expr::{ArithOp, ColumnResolver, Expr, TableFilterSet};
use crate::functions::{like_pattern, render_call, LikeKind};

/// The result of translating a single expression: the rendered SQL (if any
/// could be produced) and whether the fragment captures the *entire*
/// expression's semantics.
///
/// A `Some(sql)` with `fully_supported: false` can still occur for `AND`
/// nodes, where a subset of conjuncts was pushed down and the remainder must
/// still be evaluated locally.
#[derive(Debug, Clone)]
pub struct Translated {
    /// The rendered SQL fragment, or `None` if nothing could be pushed down.
    pub sql_fragment: Option<String>,
    /// Whether `sql_fragment` alone is equivalent to the original expression.
    pub fully_supported: bool,
}

impl Translated {
    fn none() -> Self {
        Translated {
            sql_fragment: None,
            fully_supported: false,
        }
    }

    fn full(sql: String) -> Self {
        Translated {
            sql_fragment: Some(sql),
            fully_supported: true,
        }
    }
}

/// Translate a single bound expression against a column resolver.
#[must_use]
pub fn translate(expr: &Expr, columns: &ColumnResolver<'_>) -> Translated {
    match expr {
        Expr::Column(idx) => match columns.resolve(*idx) {
            Some(name) => Translated::full(bracket_identifier(name)),
            None => Translated::none(),
        },
        Expr::Literal(value) => match sql_literal(value) {
            Ok(sql) => Translated::full(sql),
            Err(_) => Translated::none(),
        },
        Expr::Compare { op, left, right } => {
            let left = translate(left, columns);
            let right = translate(right, columns);
            match (left.fully_supported, right.fully_supported) {
                (true, true) => Translated::full(format!(
                    "{} {} {}",
                    left.sql_fragment.unwrap(),
                    op.as_sql(),
                    right.sql_fragment.unwrap()
                )),
                _ => Translated::none(),
            }
        }
        Expr::IsNull(inner) => translate_null_check(inner, columns, "IS NULL"),
        Expr::IsNotNull(inner) => translate_null_check(inner, columns, "IS NOT NULL"),
        Expr::In { expr, values } => translate_in(expr, values, columns),
        Expr::And(children) => translate_and(children, columns),
        Expr::Or(children) => translate_or(children, columns),
        Expr::Arithmetic { op, left, right } => {
            let left = translate(left, columns);
            let right = translate(right, columns);
            match (left.fully_supported, right.fully_supported) {
                (true, true) => Translated::full(format!(
                    "({} {} {})",
                    left.sql_fragment.unwrap(),
                    op.as_sql(),
                    right.sql_fragment.unwrap()
                )),
                _ => Translated::none(),
            }
        }
        Expr::Case { branches, or_else } => translate_case(branches, or_else, columns),
        Expr::Call { name, args } => translate_call(name, args, columns),
    }
}

fn translate_null_check(inner: &Expr, columns: &ColumnResolver<'_>, suffix: &str) -> Translated {
    let inner = translate(inner, columns);
    if inner.fully_supported {
        Translated::full(format!("{} {suffix}", inner.sql_fragment.unwrap()))
    } else {
        Translated::none()
    }
}

fn translate_in(expr: &Expr, values: &[SqlValue], columns: &ColumnResolver<'_>) -> Translated {
    let expr = translate(expr, columns);
    if !expr.fully_supported {
        return Translated::none();
    }
    let mut rendered = Vec::with_capacity(values.len());
    for value in values {
        match sql_literal(value) {
            Ok(sql) => rendered.push(sql),
            Err(_) => return Translated::none(),
        }
    }
    Translated::full(format!(
        "{} IN ({})",
        expr.sql_fragment.unwrap(),
        rendered.join(", ")
    ))
}

fn translate_and(children: &[Expr], columns: &ColumnResolver<'_>) -> Translated {
    let mut supported_fragments = Vec::new();
    let mut all_supported = true;
    for child in children {
        let translated = translate(child, columns);
        if let Some(sql) = translated.sql_fragment {
            if translated.fully_supported {
                supported_fragments.push(sql);
            } else {
                // A partially-supported AND child contributes nothing: its
                // own unsupported remainder still needs local evaluation, so
                // pushing down just its supported half would under-filter.
                all_supported = false;
            }
        } else {
            all_supported = false;
        }
    }
    if supported_fragments.is_empty() {
        return Translated::none();
    }
    let sql = supported_fragments.join(" AND ");
    Translated {
        sql_fragment: Some(if supported_fragments.len() > 1 {
            format!("({sql})")
        } else {
            sql
        }),
        fully_supported: all_supported,
    }
}

fn translate_or(children: &[Expr], columns: &ColumnResolver<'_>) -> Translated {
    let mut fragments = Vec::with_capacity(children.len());
    for child in children {
        let translated = translate(child, columns);
        if !translated.fully_supported {
            // OR is all-or-nothing: a single unsupported disjunct means the
            // whole predicate must be re-evaluated locally.
            trace!("rejecting OR pushdown: one or more disjuncts unsupported");
            return Translated::none();
        }
        fragments.push(translated.sql_fragment.unwrap());
    }
    if fragments.is_empty() {
        return Translated::none();
    }
    Translated::full(format!("({})", fragments.join(" OR ")))
}

fn translate_case(
    branches: &[(Expr, Expr)],
    or_else: &Option<Box<Expr>>,
    columns: &ColumnResolver<'_>,
) -> Translated {
    let mut rendered = String::from("CASE");
    for (cond, result) in branches {
        let cond = translate(cond, columns);
        let result = translate(result, columns);
        if !cond.fully_supported || !result.fully_supported {
            return Translated::none();
        }
        rendered.push_str(&format!(
            " WHEN {} THEN {}",
            cond.sql_fragment.unwrap(),
            result.sql_fragment.unwrap()
        ));
    }
    if let Some(or_else) = or_else {
        let or_else = translate(or_else, columns);
        if !or_else.fully_supported {
            return Translated::none();
        }
        rendered.push_str(&format!(" ELSE {}", or_else.sql_fragment.unwrap()));
    }
    rendered.push_str(" END");
    Translated::full(rendered)
}

fn translate_call(name: &str, args: &[Expr], columns: &ColumnResolver<'_>) -> Translated {
    if let Some((kind, case_insensitive)) = LikeKind::from_function_name(name) {
        return translate_like_call(kind, case_insensitive, args, columns);
    }

    let mut rendered_args = Vec::with_capacity(args.len());
    for arg in args {
        let translated = translate(arg, columns);
        match translated.sql_fragment {
            Some(sql) if translated.fully_supported => rendered_args.push(sql),
            _ => return Translated::none(),
        }
    }
    match render_call(name, &rendered_args) {
        Some(sql) => Translated::full(sql),
        None => Translated::none(),
    }
}

fn translate_like_call(
    kind: LikeKind,
    case_insensitive: bool,
    args: &[Expr],
    columns: &ColumnResolver<'_>,
) -> Translated {
    let [haystack, needle] = args else {
        return Translated::none();
    };
    let Expr::Literal(SqlValue::String(needle_literal)) = needle else {
        return Translated::none();
    };
    let haystack = translate(haystack, columns);
    let Some(haystack_sql) = haystack.sql_fragment.filter(|_| haystack.fully_supported) else {
        return Translated::none();
    };
    let needle_for_pattern = if case_insensitive {
        needle_literal.to_lowercase()
    } else {
        needle_literal.clone()
    };
    let pattern = like_pattern(kind, &needle_for_pattern);
    let Ok(pattern_literal) = sql_literal(&SqlValue::String(pattern)) else {
        return Translated::none();
    };
    let haystack_sql = if case_insensitive {
        format!("LOWER({haystack_sql})")
    } else {
        haystack_sql
    };
    Translated::full(format!("{haystack_sql} LIKE {pattern_literal}"))
}

/// Translate a whole filter set into a single `WHERE`-ready fragment.
///
/// Each filter in the set is ANDed; any filter (or conjunct within an `AND`
/// filter) that could not be fully pushed down leaves `needs_local_refilter`
/// set so the caller re-applies the original predicate after the rows come
/// back.
#[must_use]
pub fn translate_filter_set(filters: &TableFilterSet, columns: &ColumnResolver<'_>) -> Translated {
    if filters.filters.is_empty() {
        return Translated {
            sql_fragment: None,
            fully_supported: true,
        };
    }
    translate_and(&filters.filters, columns)
}
