//! Batched `INSERT ... VALUES` statement generation and execution.

use mssql_client::{Client, Ready, Row};
use mssql_types::{bracket_identifier, sql_literal, SqlValue};
use tracing::debug;

use crate::config::WriterConfig;
use crate::error::WriterError;

/// A set of rows to insert into a single table.
#[derive(Debug, Clone)]
pub struct InsertBatch {
    /// Target schema.
    pub schema: String,
    /// Target table.
    pub table: String,
    /// Column names, in the same order as each row's values. If
    /// `identity_column` names one of these, it is dropped from the
    /// generated statement (and from each row) rather than sent as an
    /// explicit value.
    pub columns: Vec<String>,
    /// The table's identity column, if it has one and it appears in
    /// `columns`.
    pub identity_column: Option<String>,
    /// Row values, aligned with `columns`.
    pub rows: Vec<Vec<SqlValue>>,
    /// Columns to capture via `OUTPUT INSERTED.col` for a `RETURNING`
    /// clause. Empty means no output rows are requested.
    pub returning: Vec<String>,
}

/// The result of executing an insert batch.
#[derive(Debug, Default)]
pub struct InsertOutcome {
    /// Total rows inserted across every generated statement.
    pub rows_affected: u64,
    /// Rows captured via `OUTPUT INSERTED.*`, present only when
    /// [`InsertBatch::returning`] was non-empty.
    pub returned_rows: Vec<Row>,
}

/// Build the `INSERT` statements needed to write `batch`, splitting rows
/// across multiple statements so that neither the row count nor the
/// rendered byte size of any one statement exceeds `config`'s limits.
pub fn build_statements(
    batch: &InsertBatch,
    config: &WriterConfig,
) -> Result<Vec<String>, WriterError> {
    if batch.rows.is_empty() {
        return Err(WriterError::EmptyBatch);
    }

    let insert_columns: Vec<&String> = batch
        .columns
        .iter()
        .filter(|c| Some(*c) != batch.identity_column.as_ref())
        .collect();
    let keep_mask: Vec<bool> = batch
        .columns
        .iter()
        .map(|c| Some(c) != batch.identity_column.as_ref())
        .collect();

    let column_list = insert_columns
        .iter()
        .map(|c| bracket_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let output_clause = if batch.returning.is_empty() {
        String::new()
    } else {
        format!(
            " OUTPUT {}",
            batch
                .returning
                .iter()
                .map(|c| format!("INSERTED.{}", bracket_identifier(c)))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    let prefix = format!(
        "INSERT INTO {}.{} ({column_list}){output_clause} VALUES ",
        bracket_identifier(&batch.schema),
        bracket_identifier(&batch.table),
    );

    let mut rendered_rows = Vec::with_capacity(batch.rows.len());
    for (row_index, row) in batch.rows.iter().enumerate() {
        if row.len() != batch.columns.len() {
            return Err(WriterError::ArityMismatch {
                row_index,
                expected: batch.columns.len(),
                actual: row.len(),
            });
        }
        let mut literals = Vec::with_capacity(insert_columns.len());
        for (value, keep) in row.iter().zip(keep_mask.iter()) {
            if *keep {
                literals.push(sql_literal(value)?);
            }
        }
        let row_sql = format!("({})", literals.join(", "));
        let size = prefix.len() + row_sql.len() + 1;
        if size > config.max_bytes_per_batch {
            return Err(WriterError::RowTooLarge {
                row_index,
                size,
                limit: config.max_bytes_per_batch,
            });
        }
        rendered_rows.push(row_sql);
    }

    let mut statements = Vec::new();
    let mut current_rows: Vec<&String> = Vec::new();
    let mut current_len = prefix.len();

    for row_sql in &rendered_rows {
        let added_len = row_sql.len() + 2;
        let would_exceed_rows = current_rows.len() >= config.max_rows_per_batch;
        let would_exceed_bytes =
            !current_rows.is_empty() && current_len + added_len > config.max_bytes_per_batch;
        if would_exceed_rows || would_exceed_bytes {
            statements.push(finish_statement(&prefix, &current_rows));
            current_rows.clear();
            current_len = prefix.len();
        }
        current_rows.push(row_sql);
        current_len += added_len;
    }
    if !current_rows.is_empty() {
        statements.push(finish_statement(&prefix, &current_rows));
    }

    debug!(
        rows = batch.rows.len(),
        statements = statements.len(),
        "built insert batch"
    );
    Ok(statements)
}

fn finish_statement(prefix: &str, rows: &[&String]) -> String {
    let mut sql = String::with_capacity(prefix.len() + rows.len() * 16);
    sql.push_str(prefix);
    sql.push_str(
        &rows
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    sql.push(';');
    sql
}

/// Execute an insert batch against an open connection, splitting it into as
/// many statements as `config` requires.
pub async fn execute_insert(
    conn: &mut Client<Ready>,
    batch: &InsertBatch,
    config: &WriterConfig,
) -> Result<InsertOutcome, WriterError> {
    let statements = build_statements(batch, config)?;
    let mut outcome = InsertOutcome::default();

    for sql in statements {
        if batch.returning.is_empty() {
            let rows_affected = conn.execute(&sql, &[]).await?;
            outcome.rows_affected += rows_affected;
        } else {
            let mut stream = conn.query(&sql, &[]).await?;
            let rows = stream.collect_all().await?;
            outcome.rows_affected += rows.len() as u64;
            outcome.returned_rows.extend(rows);
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> InsertBatch {
        InsertBatch {
            schema: "dbo".to_string(),
            table: "orders".to_string(),
            columns: vec![
                "id".to_string(),
                "customer".to_string(),
                "total".to_string(),
            ],
            identity_column: Some("id".to_string()),
            rows: vec![
                vec![
                    SqlValue::Int(1),
                    SqlValue::String("alice".to_string()),
                    SqlValue::Double(10.5),
                ],
                vec![
                    SqlValue::Int(2),
                    SqlValue::String("bob".to_string()),
                    SqlValue::Double(20.0),
                ],
            ],
            returning: vec![],
        }
    }

    #[test]
    fn identity_column_is_omitted_from_statement() {
        let config = WriterConfig::default();
        let statements = build_statements(&sample_batch(), &config).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("([customer], [total])"));
        assert!(!statements[0].contains("[id]"));
        assert!(statements[0].contains("(N'alice', 1.05e1)") || statements[0].contains("N'alice'"));
    }

    #[test]
    fn returning_clause_adds_output_inserted() {
        let mut batch = sample_batch();
        batch.returning = vec!["customer".to_string()];
        let config = WriterConfig::default();
        let statements = build_statements(&batch, &config).unwrap();
        assert!(statements[0].contains("OUTPUT INSERTED.[customer]"));
    }

    #[test]
    fn row_cap_splits_into_multiple_statements() {
        let mut batch = sample_batch();
        batch.rows = (0..5)
            .map(|i| {
                vec![
                    SqlValue::Int(i),
                    SqlValue::String(format!("c{i}")),
                    SqlValue::Double(1.0),
                ]
            })
            .collect();
        let config = WriterConfig {
            max_rows_per_batch: 2,
            ..WriterConfig::default()
        };
        let statements = build_statements(&batch, &config).unwrap();
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let mut batch = sample_batch();
        batch.rows.clear();
        let config = WriterConfig::default();
        assert!(matches!(
            build_statements(&batch, &config),
            Err(WriterError::EmptyBatch)
        ));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut batch = sample_batch();
        batch.rows.push(vec![SqlValue::Int(3)]);
        let config = WriterConfig::default();
        assert!(matches!(
            build_statements(&batch, &config),
            Err(WriterError::ArityMismatch { row_index: 2, .. })
        ));
    }

    #[test]
    fn nan_float_is_rejected() {
        let mut batch = sample_batch();
        batch.rows[0][2] = SqlValue::Double(f64::NAN);
        let config = WriterConfig::default();
        assert!(build_statements(&batch, &config).is_err());
    }

    #[test]
    fn oversized_single_row_is_rejected_not_split() {
        let mut batch = sample_batch();
        batch.rows = vec![vec![
            SqlValue::Int(1),
            SqlValue::String("x".repeat(1000)),
            SqlValue::Double(1.0),
        ]];
        let config = WriterConfig {
            max_bytes_per_batch: 100,
            ..WriterConfig::default()
        };
        assert!(matches!(
            build_statements(&batch, &config),
            Err(WriterError::RowTooLarge { row_index: 0, .. })
        ));
    }
}
