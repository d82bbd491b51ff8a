//! Host value -> T-SQL literal text formatting.
//!
//! This is the write-side counterpart to [`crate::decode`]: instead of
//! parsing wire bytes into a [`SqlValue`], it renders a value as the exact
//! T-SQL text a writer can embed in an `INSERT ... VALUES (...)` statement.
//! Used by the bulk-insert/update/delete batch builders, which need literal
//! text rather than parameter placeholders because a single statement can
//! carry hundreds of rows.

use crate::error::TypeError;
use crate::value::SqlValue;

/// Render a [`SqlValue`] as a T-SQL literal.
///
/// `NULL` renders as the bare keyword. Strings are wrapped in `N'...'` with
/// embedded quotes doubled. Floats are rejected if NaN or infinite, since
/// SQL Server's `float`/`real` types cannot represent either.
pub fn sql_literal(value: &SqlValue) -> Result<String, TypeError> {
    Ok(match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::TinyInt(v) => v.to_string(),
        SqlValue::SmallInt(v) => v.to_string(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::BigInt(v) => v.to_string(),
        SqlValue::Float(v) => float_literal(*v as f64, "REAL")?,
        SqlValue::Double(v) => float_literal(*v, "FLOAT")?,
        SqlValue::String(s) => quote_string(s),
        SqlValue::Binary(b) => hex_literal(b),
        #[cfg(feature = "decimal")]
        SqlValue::Decimal(d) => d.to_string(),
        #[cfg(feature = "uuid")]
        SqlValue::Uuid(u) => format!("'{u}'"),
        #[cfg(feature = "chrono")]
        SqlValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        #[cfg(feature = "chrono")]
        SqlValue::Time(t) => format!("'{}'", t.format("%H:%M:%S%.7f")),
        #[cfg(feature = "chrono")]
        SqlValue::DateTime(dt) => format!(
            "CAST('{}' AS DATETIME2(7))",
            dt.format("%Y-%m-%dT%H:%M:%S%.7f")
        ),
        #[cfg(feature = "chrono")]
        SqlValue::DateTimeOffset(dt) => format!(
            "CAST('{}' AS DATETIMEOFFSET(7))",
            dt.format("%Y-%m-%dT%H:%M:%S%.7f%:z")
        ),
        #[cfg(feature = "json")]
        SqlValue::Json(j) => quote_string(&j.to_string()),
        SqlValue::Xml(_) => {
            return Err(TypeError::UnsupportedConversion {
                from: "XML".to_string(),
                to: "literal",
            });
        }
    })
}

/// Render an unsigned 64-bit integer (host `UBIGINT`) as `CAST(n AS DECIMAL(20,0))`,
/// since T-SQL has no native unsigned-bigint type wide enough to hold the full range.
#[must_use]
pub fn ubigint_literal(value: u64) -> String {
    format!("CAST({value} AS DECIMAL(20,0))")
}

/// Render a 128-bit integer (host `HUGEINT`) as `CAST(n AS DECIMAL(38,0))`.
#[must_use]
pub fn hugeint_literal(value: i128) -> String {
    format!("CAST({value} AS DECIMAL(38,0))")
}

fn float_literal(value: f64, type_name: &'static str) -> Result<String, TypeError> {
    if value.is_nan() {
        return Err(TypeError::NonFiniteFloat(type_name));
    }
    if value.is_infinite() {
        return Err(TypeError::NonFiniteFloat(type_name));
    }
    Ok(format!("{value:e}"))
}

/// Quote a string as a T-SQL `N'...'` Unicode literal, doubling embedded quotes.
#[must_use]
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    out.push_str("N'");
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Render bytes as a `0x...` hex literal.
#[must_use]
pub fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// Escape a bracketed identifier (schema, table, or column name), doubling
/// any embedded `]`. Callers are responsible for adding the surrounding
/// `[...]`; this only handles the doubling.
#[must_use]
pub fn escape_identifier(name: &str) -> String {
    name.replace(']', "]]")
}

/// Wrap an identifier in brackets with proper `]` doubling, e.g. `foo]bar` ->
/// `[foo]]bar]`. This is the form that should always be used when
/// interpolating a host-supplied identifier into generated SQL.
#[must_use]
pub fn bracket_identifier(name: &str) -> String {
    format!("[{}]", escape_identifier(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_bare_keyword() {
        assert_eq!(sql_literal(&SqlValue::Null).unwrap(), "NULL");
    }

    #[test]
    fn bool_renders_as_bit() {
        assert_eq!(sql_literal(&SqlValue::Bool(true)).unwrap(), "1");
        assert_eq!(sql_literal(&SqlValue::Bool(false)).unwrap(), "0");
    }

    #[test]
    fn string_quotes_and_doubles_embedded_quotes() {
        let v = SqlValue::String("O'Brien".to_string());
        assert_eq!(sql_literal(&v).unwrap(), "N'O''Brien'");
    }

    #[test]
    fn binary_renders_as_hex() {
        let v = SqlValue::Binary(bytes::Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(sql_literal(&v).unwrap(), "0xDEADBEEF");
    }

    #[test]
    fn nan_and_infinite_floats_are_rejected() {
        assert!(sql_literal(&SqlValue::Double(f64::NAN)).is_err());
        assert!(sql_literal(&SqlValue::Double(f64::INFINITY)).is_err());
        assert!(sql_literal(&SqlValue::Double(f64::NEG_INFINITY)).is_err());
        assert!(sql_literal(&SqlValue::Double(1.5)).is_ok());
    }

    #[test]
    fn ubigint_casts_to_decimal_20_0() {
        assert_eq!(ubigint_literal(u64::MAX), "CAST(18446744073709551615 AS DECIMAL(20,0))");
    }

    #[test]
    fn hugeint_casts_to_decimal_38_0() {
        assert_eq!(hugeint_literal(-1), "CAST(-1 AS DECIMAL(38,0))");
    }

    #[test]
    fn bracket_identifier_doubles_embedded_bracket() {
        assert_eq!(bracket_identifier("a]b"), "[a]]b]");
        assert_eq!(bracket_identifier("plain"), "[plain]");
    }

    #[cfg(feature = "uuid")]
    #[test]
    fn uuid_renders_quoted() {
        let u = uuid::Uuid::nil();
        assert_eq!(
            sql_literal(&SqlValue::Uuid(u)).unwrap(),
            "'00000000-0000-0000-0000-000000000000'"
        );
    }
}
