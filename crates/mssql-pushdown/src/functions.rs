//! Scalar function whitelist.
//!
//! Only the functions named here can be pushed down; everything else (an
//! aggregate, `substring`, `replace`, `concat`, an unrecognized name, or any
//! timezone-aware function) is rejected and left for local re-evaluation.

/// Render a whitelisted scalar function call, given its already-rendered
/// argument fragments. Returns `None` if the function is not supported for
/// pushdown, regardless of how many arguments were supplied.
pub fn render_call(name: &str, args: &[String]) -> Option<String> {
    match name {
        "lower" => unary(args, |a| format!("LOWER({a})")),
        "upper" => unary(args, |a| format!("UPPER({a})")),
        "length" => unary(args, |a| format!("LEN({a})")),
        "trim" => unary(args, |a| format!("LTRIM(RTRIM({a}))")),
        "ltrim" => unary(args, |a| format!("LTRIM({a})")),
        "rtrim" => unary(args, |a| format!("RTRIM({a})")),
        "year" => unary(args, |a| format!("YEAR({a})")),
        "month" => unary(args, |a| format!("MONTH({a})")),
        "day" => unary(args, |a| format!("DAY({a})")),
        "hour" => unary(args, |a| format!("DATEPART(HOUR, {a})")),
        "minute" => unary(args, |a| format!("DATEPART(MINUTE, {a})")),
        "second" => unary(args, |a| format!("DATEPART(SECOND, {a})")),
        "current_date" => nullary(args, "CAST(GETDATE() AS DATE)"),
        "current_timestamp" => nullary(args, "GETDATE()"),
        "date_diff" => ternary(args, |part, a, b| format!("DATEDIFF({part}, {a}, {b})")),
        "date_add" => ternary(args, |part, n, d| format!("DATEADD({part}, {n}, {d})")),
        "date_part" => binary(args, |part, d| format!("DATEPART({part}, {d})")),
        // Explicitly rejected: no direct T-SQL equivalent pushdown is safe for,
        // or the semantics (timezone handling, epoch arithmetic) would diverge
        // from the host engine's own evaluation.
        "substring" | "replace" | "concat" | "epoch" | "epoch_ms" | "make_date"
        | "make_timestamp" | "strftime" | "strptime" => None,
        _ => None,
    }
}

fn unary(args: &[String], render: impl FnOnce(&str) -> String) -> Option<String> {
    match args {
        [a] => Some(render(a)),
        _ => None,
    }
}

fn binary(args: &[String], render: impl FnOnce(&str, &str) -> String) -> Option<String> {
    match args {
        [a, b] => Some(render(a, b)),
        _ => None,
    }
}

fn ternary(args: &[String], render: impl FnOnce(&str, &str, &str) -> String) -> Option<String> {
    match args {
        [a, b, c] => Some(render(a, b, c)),
        _ => None,
    }
}

fn nullary(args: &[String], sql: &str) -> Option<String> {
    if args.is_empty() {
        Some(sql.to_string())
    } else {
        None
    }
}

/// Escape a LIKE pattern's literal text so that `%`, `_`, and `[` are matched
/// literally rather than as wildcards, per the `ESCAPE '[]'`-free bracket
/// form T-SQL supports: `[%]`, `[_]`, `[[]`.
///
/// This only neutralizes `LIKE` wildcard characters; it does not double
/// embedded single quotes — the caller still passes the result through
/// [`mssql_types::sql_literal`]/[`mssql_types::quote_string`] to get a valid
/// T-SQL string literal, which handles quote-doubling itself.
#[must_use]
pub fn escape_like_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '%' => out.push_str("[%]"),
            '_' => out.push_str("[_]"),
            '[' => out.push_str("[[]"),
            other => out.push(other),
        }
    }
    out
}

/// Render a `prefix`/`suffix`/`contains` string-match function as a `LIKE`
/// fragment. `column_sql` and `needle` are already-rendered SQL fragments;
/// `needle_literal` is the raw string being matched, used to build the
/// escaped pattern.
#[must_use]
pub fn like_pattern(kind: LikeKind, needle_literal: &str) -> String {
    let escaped = escape_like_literal(needle_literal);
    match kind {
        LikeKind::Prefix => format!("{escaped}%"),
        LikeKind::Suffix => format!("%{escaped}"),
        LikeKind::Contains => format!("%{escaped}%"),
    }
}

/// Which `LIKE` pattern shape a string-match function decomposes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    /// `prefix(col, s)` -> `col LIKE 's%'`.
    Prefix,
    /// `suffix(col, s)` -> `col LIKE '%s'`.
    Suffix,
    /// `contains(col, s)` -> `col LIKE '%s%'`.
    Contains,
}

impl LikeKind {
    /// Map a whitelisted function name to its pattern shape and case
    /// sensitivity. Returns `(kind, case_insensitive)`.
    #[must_use]
    pub fn from_function_name(name: &str) -> Option<(Self, bool)> {
        match name {
            "prefix" => Some((LikeKind::Prefix, false)),
            "suffix" => Some((LikeKind::Suffix, false)),
            "contains" => Some((LikeKind::Contains, false)),
            "iprefix" => Some((LikeKind::Prefix, true)),
            "isuffix" => Some((LikeKind::Suffix, true)),
            "icontains" => Some((LikeKind::Contains, true)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelisted_unary_renders() {
        assert_eq!(
            render_call("lower", &["[name]".to_string()]),
            Some("LOWER([name])".to_string())
        );
        assert_eq!(
            render_call("length", &["[name]".to_string()]),
            Some("LEN([name])".to_string())
        );
        assert_eq!(
            render_call("trim", &["[name]".to_string()]),
            Some("LTRIM(RTRIM([name]))".to_string())
        );
    }

    #[test]
    fn rejected_functions_return_none() {
        for name in [
            "substring",
            "replace",
            "concat",
            "epoch",
            "epoch_ms",
            "make_date",
            "make_timestamp",
            "strftime",
            "strptime",
            "sum",
            "totally_unknown",
        ] {
            assert_eq!(render_call(name, &["[x]".to_string()]), None, "{name}");
        }
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert_eq!(render_call("lower", &[]), None);
        assert_eq!(
            render_call("lower", &["a".to_string(), "b".to_string()]),
            None
        );
    }

    #[test]
    fn date_functions_render() {
        assert_eq!(
            render_call(
                "date_diff",
                &["day".to_string(), "[a]".to_string(), "[b]".to_string()]
            ),
            Some("DATEDIFF(day, [a], [b])".to_string())
        );
        assert_eq!(
            render_call("current_timestamp", &[]),
            Some("GETDATE()".to_string())
        );
    }

    #[test]
    fn like_escaping_handles_wildcards() {
        assert_eq!(escape_like_literal("50%_off[1]"), "50[%][_]off[[]1]");
        assert_eq!(escape_like_literal("o'brien"), "o'brien");
    }

    #[test]
    fn like_kind_maps_case_insensitive_variants() {
        assert_eq!(
            LikeKind::from_function_name("iprefix"),
            Some((LikeKind::Prefix, true))
        );
        assert_eq!(
            LikeKind::from_function_name("contains"),
            Some((LikeKind::Contains, false))
        );
        assert_eq!(LikeKind::from_function_name("substring"), None);
    }
}
