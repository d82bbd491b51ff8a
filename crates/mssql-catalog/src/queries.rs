//! Discovery SQL text for schemas, tables, columns, and primary keys.
//!
//! Kept as plain `const`/`fn` SQL text rather than a query builder, matching
//! how the teacher crate issues fixed administrative statements (e.g.
//! `sp_reset_connection` in the pool's release path) rather than composing
//! them through a DSL.

/// Enumerate user schemas, excluding system schemas and the built-in
/// `db_*` principal schemas.
pub const SCHEMAS: &str = "\
SELECT s.name AS schema_name
FROM sys.schemas AS s
WHERE s.name NOT IN ('sys', 'INFORMATION_SCHEMA')
  AND s.name NOT LIKE 'db[_]%'
ORDER BY s.name;";

/// Enumerate non-shipped tables (`U`) and views (`V`) in a schema, with an
/// approximate row count from partition-level statistics. `@schema` must be
/// substituted by the caller (see [`tables_for_schema`]).
pub fn tables_for_schema(schema: &str) -> String {
    format!(
        "\
SELECT o.name AS object_name,
       o.type AS object_type,
       ISNULL(SUM(ps.row_count), 0) AS approx_rows
FROM sys.objects AS o
JOIN sys.schemas AS s ON s.schema_id = o.schema_id
LEFT JOIN sys.dm_db_partition_stats AS ps
       ON ps.object_id = o.object_id AND ps.index_id IN (0, 1)
WHERE s.name = N'{schema}'
  AND o.type IN ('U', 'V')
  AND o.is_ms_shipped = 0
GROUP BY o.name, o.type
ORDER BY o.name;",
        schema = escape_literal(schema)
    )
}

/// Enumerate columns of a single table/view by `OBJECT_ID(schema.name)`.
pub fn columns_for_table(schema: &str, table: &str) -> String {
    format!(
        "\
SELECT c.name AS column_name,
       c.column_id AS ordinal,
       t.name AS type_name,
       t.is_user_defined,
       c.max_length,
       c.precision,
       c.scale,
       c.is_nullable,
       c.collation_name
FROM sys.columns AS c
JOIN sys.types AS t ON t.user_type_id = c.user_type_id
WHERE c.object_id = OBJECT_ID(N'{qualified}')
ORDER BY c.column_id;",
        qualified = escape_literal(&format!("{schema}.{table}"))
    )
}

/// Discover the primary key of a table, ordered by key ordinal.
pub fn primary_key_for_table(schema: &str, table: &str) -> String {
    format!(
        "\
SELECT c.name AS column_name,
       ic.key_ordinal AS ordinal,
       t.name AS type_name
FROM sys.key_constraints AS kc
JOIN sys.indexes AS i ON i.object_id = kc.parent_object_id AND i.index_id = kc.unique_index_id
JOIN sys.index_columns AS ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
JOIN sys.columns AS c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
JOIN sys.types AS t ON t.user_type_id = c.user_type_id
WHERE kc.parent_object_id = OBJECT_ID(N'{qualified}')
  AND kc.type = 'PK'
ORDER BY ic.key_ordinal;",
        qualified = escape_literal(&format!("{schema}.{table}"))
    )
}

/// Single-query bulk preload: every user schema, table/view, and column in
/// one JOIN, grouped by `(schema, table)` on the client side. Preferred for
/// catalogs with thousands of tables, where per-table column discovery would
/// issue one round-trip per table.
pub const BULK_PRELOAD: &str = "\
SELECT s.name AS schema_name,
       o.name AS object_name,
       o.type AS object_type,
       c.name AS column_name,
       c.column_id AS ordinal,
       t.name AS type_name,
       t.is_user_defined,
       c.max_length,
       c.precision,
       c.scale,
       c.is_nullable,
       c.collation_name
FROM sys.objects AS o
JOIN sys.schemas AS s ON s.schema_id = o.schema_id
JOIN sys.columns AS c ON c.object_id = o.object_id
JOIN sys.types AS t ON t.user_type_id = c.user_type_id
WHERE s.name NOT IN ('sys', 'INFORMATION_SCHEMA')
  AND s.name NOT LIKE 'db[_]%'
  AND o.type IN ('U', 'V')
  AND o.is_ms_shipped = 0
ORDER BY s.name, o.name, c.column_id;";

/// Double any single quotes in a value that will be interpolated into a
/// string literal within discovery SQL (schema/table names are not user
/// SQL text, but they can still contain quotes).
fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_for_schema_substitutes_and_escapes() {
        let sql = tables_for_schema("d'bo");
        assert!(sql.contains("N'd''bo'"));
    }

    #[test]
    fn columns_for_table_uses_object_id() {
        let sql = columns_for_table("dbo", "orders");
        assert!(sql.contains("OBJECT_ID(N'dbo.orders')"));
    }

    #[test]
    fn primary_key_query_filters_to_pk_constraints() {
        let sql = primary_key_for_table("dbo", "orders");
        assert!(sql.contains("kc.type = 'PK'"));
        assert!(sql.contains("ORDER BY ic.key_ordinal"));
    }
}
