//! `CREATE TABLE ... AS SELECT`, implemented as two non-atomic phases: DDL
//! to create the destination table, then a bulk insert of the already
//! materialized source rows. SQL Server has no native atomic CTAS; a crash
//! between the two phases leaves a created-but-empty (or partially
//! populated) table behind, which callers must treat as a recoverable,
//! re-driveable state rather than a transactional guarantee.

use mssql_client::{Client, Ready};
use mssql_types::bracket_identifier;
use tracing::warn;

use crate::config::WriterConfig;
use crate::error::WriterError;
use crate::insert::{execute_insert, InsertBatch, InsertOutcome};

/// A destination column definition for the created table.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// T-SQL type, verbatim (e.g. `"NVARCHAR(255)"`, `"INT"`).
    pub sql_type: String,
    /// Whether the column allows `NULL`.
    pub nullable: bool,
}

/// A `CREATE TABLE AS SELECT`-style request: create `schema.table` with the
/// given columns, then insert the already-fetched source rows.
#[derive(Debug, Clone)]
pub struct CreateTableAsSelect {
    /// Destination schema.
    pub schema: String,
    /// Destination table.
    pub table: String,
    /// Column definitions for the `CREATE TABLE` phase.
    pub columns: Vec<ColumnDef>,
    /// If true, drop any existing table of the same name first (`OR
    /// REPLACE` semantics implemented as `DROP TABLE IF EXISTS` + `CREATE
    /// TABLE`, not a single atomic statement).
    pub or_replace: bool,
}

/// Result of running both phases.
#[derive(Debug, Default)]
pub struct CreateTableOutcome {
    /// The DDL statements executed, in order (for diagnostics/logging).
    pub ddl_statements: Vec<String>,
    /// The outcome of the bulk-insert phase.
    pub insert: InsertOutcome,
}

/// Build the DDL statements for the create phase: an optional
/// `DROP TABLE IF EXISTS` (when `or_replace` is set) followed by
/// `CREATE TABLE`.
#[must_use]
pub fn build_ddl(request: &CreateTableAsSelect) -> Vec<String> {
    let qualified = format!(
        "{}.{}",
        bracket_identifier(&request.schema),
        bracket_identifier(&request.table)
    );
    let mut statements = Vec::new();
    if request.or_replace {
        statements.push(format!("DROP TABLE IF EXISTS {qualified};"));
    }
    let column_defs = request
        .columns
        .iter()
        .map(|c| {
            let nullability = if c.nullable { "NULL" } else { "NOT NULL" };
            format!(
                "{} {} {}",
                bracket_identifier(&c.name),
                c.sql_type,
                nullability
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    statements.push(format!("CREATE TABLE {qualified} ({column_defs});"));
    statements
}

/// Run the create-table phase, then insert `rows` via the normal insert
/// path. Not atomic: if the connection is lost between the DDL and the
/// insert, the destination table exists but is empty (or partially
/// populated if one of several insert statements already committed).
pub async fn execute_create_table_as(
    conn: &mut Client<Ready>,
    request: &CreateTableAsSelect,
    rows: Vec<Vec<mssql_types::SqlValue>>,
    config: &WriterConfig,
) -> Result<CreateTableOutcome, WriterError> {
    let ddl_statements = build_ddl(request);
    for sql in &ddl_statements {
        conn.execute(sql, &[]).await?;
    }

    if rows.is_empty() {
        warn!(
            schema = %request.schema,
            table = %request.table,
            "create-table-as-select produced no source rows; table created empty"
        );
        return Ok(CreateTableOutcome {
            ddl_statements,
            insert: InsertOutcome::default(),
        });
    }

    let batch = InsertBatch {
        schema: request.schema.clone(),
        table: request.table.clone(),
        columns: request.columns.iter().map(|c| c.name.clone()).collect(),
        identity_column: None,
        rows,
        returning: vec![],
    };
    let insert = execute_insert(conn, &batch, config).await?;
    Ok(CreateTableOutcome {
        ddl_statements,
        insert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(or_replace: bool) -> CreateTableAsSelect {
        CreateTableAsSelect {
            schema: "dbo".to_string(),
            table: "snapshot".to_string(),
            columns: vec![
                ColumnDef {
                    name: "id".to_string(),
                    sql_type: "INT".to_string(),
                    nullable: false,
                },
                ColumnDef {
                    name: "label".to_string(),
                    sql_type: "NVARCHAR(255)".to_string(),
                    nullable: true,
                },
            ],
            or_replace,
        }
    }

    #[test]
    fn create_without_replace_has_single_statement() {
        let statements = build_ddl(&sample_request(false));
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE [dbo].[snapshot]"));
    }

    #[test]
    fn or_replace_drops_before_creating() {
        let statements = build_ddl(&sample_request(true));
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("DROP TABLE IF EXISTS [dbo].[snapshot]"));
        assert!(statements[1].starts_with("CREATE TABLE [dbo].[snapshot]"));
    }

    #[test]
    fn column_defs_carry_nullability() {
        let statements = build_ddl(&sample_request(false));
        assert!(statements[0].contains("[id] INT NOT NULL"));
        assert!(statements[0].contains("[label] NVARCHAR(255) NULL"));
    }
}
