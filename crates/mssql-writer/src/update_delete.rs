//! Batched `UPDATE`/`DELETE` via a `VALUES` join on the primary key.

use mssql_client::{Client, Ready};
use mssql_types::{bracket_identifier, sql_literal, SqlValue};
use tracing::debug;

use crate::config::WriterConfig;
use crate::error::WriterError;

/// A set of row-targeted updates against a single table.
#[derive(Debug, Clone)]
pub struct UpdateBatch {
    /// Target schema.
    pub schema: String,
    /// Target table.
    pub table: String,
    /// The table's primary-key column names, in key-ordinal order.
    pub pk_columns: Vec<String>,
    /// Columns being assigned new values. Must not overlap `pk_columns`.
    pub set_columns: Vec<String>,
    /// `(pk_values, set_values)` pairs, one per row, aligned with
    /// `pk_columns`/`set_columns` respectively.
    pub rows: Vec<(Vec<SqlValue>, Vec<SqlValue>)>,
}

/// A set of row-targeted deletes against a single table.
#[derive(Debug, Clone)]
pub struct DeleteBatch {
    /// Target schema.
    pub schema: String,
    /// Target table.
    pub table: String,
    /// The table's primary-key column names, in key-ordinal order.
    pub pk_columns: Vec<String>,
    /// Primary-key values identifying the rows to delete.
    pub rows: Vec<Vec<SqlValue>>,
}

fn validate_pk(schema: &str, table: &str, pk_columns: &[String]) -> Result<(), WriterError> {
    if pk_columns.is_empty() {
        return Err(WriterError::MissingPrimaryKey {
            schema: schema.to_string(),
            table: table.to_string(),
        });
    }
    Ok(())
}

/// Build the `UPDATE` statements for `batch`, splitting rows across
/// statements per `config`.
pub fn build_update_statements(
    batch: &UpdateBatch,
    config: &WriterConfig,
) -> Result<Vec<String>, WriterError> {
    validate_pk(&batch.schema, &batch.table, &batch.pk_columns)?;
    for set_col in &batch.set_columns {
        if batch.pk_columns.contains(set_col) {
            return Err(WriterError::PrimaryKeyColumnUpdate(set_col.clone()));
        }
    }
    if batch.rows.is_empty() {
        return Err(WriterError::EmptyBatch);
    }

    let value_columns: Vec<String> = batch
        .pk_columns
        .iter()
        .chain(batch.set_columns.iter())
        .cloned()
        .collect();
    let value_column_list = value_columns
        .iter()
        .map(|c| bracket_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let set_clause = batch
        .set_columns
        .iter()
        .map(|c| format!("t.{0} = v.{0}", bracket_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let join_clause = batch
        .pk_columns
        .iter()
        .map(|c| format!("t.{0} = v.{0}", bracket_identifier(c)))
        .collect::<Vec<_>>()
        .join(" AND ");

    let prefix = format!(
        "UPDATE t SET {set_clause} FROM {}.{} AS t JOIN (VALUES ",
        bracket_identifier(&batch.schema),
        bracket_identifier(&batch.table),
    );
    let suffix = format!(") AS v ({value_column_list}) ON {join_clause};");

    let mut rendered_rows = Vec::with_capacity(batch.rows.len());
    for (row_index, (pk_values, set_values)) in batch.rows.iter().enumerate() {
        if pk_values.len() != batch.pk_columns.len() {
            return Err(WriterError::ArityMismatch {
                row_index,
                expected: batch.pk_columns.len(),
                actual: pk_values.len(),
            });
        }
        if set_values.len() != batch.set_columns.len() {
            return Err(WriterError::ArityMismatch {
                row_index,
                expected: batch.set_columns.len(),
                actual: set_values.len(),
            });
        }
        let mut literals = Vec::with_capacity(value_columns.len());
        for value in pk_values.iter().chain(set_values.iter()) {
            literals.push(sql_literal(value)?);
        }
        rendered_rows.push(format!("({})", literals.join(", ")));
    }

    let statements = split_statements(&prefix, &suffix, &rendered_rows, config);
    debug!(
        rows = batch.rows.len(),
        statements = statements.len(),
        "built update batch"
    );
    Ok(statements)
}

/// Build the `DELETE` statements for `batch`, splitting rows across
/// statements per `config`.
pub fn build_delete_statements(
    batch: &DeleteBatch,
    config: &WriterConfig,
) -> Result<Vec<String>, WriterError> {
    validate_pk(&batch.schema, &batch.table, &batch.pk_columns)?;
    if batch.rows.is_empty() {
        return Err(WriterError::EmptyBatch);
    }

    let value_column_list = batch
        .pk_columns
        .iter()
        .map(|c| bracket_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let join_clause = batch
        .pk_columns
        .iter()
        .map(|c| format!("t.{0} = v.{0}", bracket_identifier(c)))
        .collect::<Vec<_>>()
        .join(" AND ");

    let prefix = format!(
        "DELETE t FROM {}.{} AS t JOIN (VALUES ",
        bracket_identifier(&batch.schema),
        bracket_identifier(&batch.table),
    );
    let suffix = format!(") AS v ({value_column_list}) ON {join_clause};");

    let mut rendered_rows = Vec::with_capacity(batch.rows.len());
    for (row_index, pk_values) in batch.rows.iter().enumerate() {
        if pk_values.len() != batch.pk_columns.len() {
            return Err(WriterError::ArityMismatch {
                row_index,
                expected: batch.pk_columns.len(),
                actual: pk_values.len(),
            });
        }
        let mut literals = Vec::with_capacity(pk_values.len());
        for value in pk_values {
            literals.push(sql_literal(value)?);
        }
        rendered_rows.push(format!("({})", literals.join(", ")));
    }

    let statements = split_statements(&prefix, &suffix, &rendered_rows, config);
    debug!(
        rows = batch.rows.len(),
        statements = statements.len(),
        "built delete batch"
    );
    Ok(statements)
}

/// Execute an update batch, returning the total rows affected.
pub async fn execute_update(
    conn: &mut Client<Ready>,
    batch: &UpdateBatch,
    config: &WriterConfig,
) -> Result<u64, WriterError> {
    let mut rows_affected = 0;
    for sql in build_update_statements(batch, config)? {
        rows_affected += conn.execute(&sql, &[]).await?;
    }
    Ok(rows_affected)
}

/// Execute a delete batch, returning the total rows affected.
pub async fn execute_delete(
    conn: &mut Client<Ready>,
    batch: &DeleteBatch,
    config: &WriterConfig,
) -> Result<u64, WriterError> {
    let mut rows_affected = 0;
    for sql in build_delete_statements(batch, config)? {
        rows_affected += conn.execute(&sql, &[]).await?;
    }
    Ok(rows_affected)
}

fn split_statements(
    prefix: &str,
    suffix: &str,
    rows: &[String],
    config: &WriterConfig,
) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current_rows: Vec<&String> = Vec::new();
    let mut current_len = prefix.len() + suffix.len();

    for row_sql in rows {
        let added_len = row_sql.len() + 2;
        let would_exceed_rows = current_rows.len() >= config.max_rows_per_batch;
        let would_exceed_bytes = !current_rows.is_empty()
            && current_len + added_len > config.max_bytes_per_batch;
        if would_exceed_rows || would_exceed_bytes {
            statements.push(finish(prefix, suffix, &current_rows));
            current_rows.clear();
            current_len = prefix.len() + suffix.len();
        }
        current_rows.push(row_sql);
        current_len += added_len;
    }
    if !current_rows.is_empty() {
        statements.push(finish(prefix, suffix, &current_rows));
    }
    statements
}

fn finish(prefix: &str, suffix: &str, rows: &[&String]) -> String {
    let mut sql = String::with_capacity(prefix.len() + suffix.len() + rows.len() * 16);
    sql.push_str(prefix);
    sql.push_str(
        &rows
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    sql.push_str(suffix);
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_update() -> UpdateBatch {
        UpdateBatch {
            schema: "dbo".to_string(),
            table: "orders".to_string(),
            pk_columns: vec!["id".to_string()],
            set_columns: vec!["status".to_string()],
            rows: vec![(
                vec![SqlValue::Int(1)],
                vec![SqlValue::String("shipped".to_string())],
            )],
        }
    }

    #[test]
    fn update_renders_values_join() {
        let config = WriterConfig::default();
        let statements = build_update_statements(&sample_update(), &config).unwrap();
        assert_eq!(statements.len(), 1);
        let sql = &statements[0];
        assert!(sql.starts_with("UPDATE t SET t.[status] = v.[status]"));
        assert!(sql.contains("JOIN (VALUES (1, N'shipped')) AS v ([id], [status])"));
        assert!(sql.contains("ON t.[id] = v.[id]"));
    }

    #[test]
    fn updating_primary_key_column_is_rejected() {
        let mut batch = sample_update();
        batch.set_columns.push("id".to_string());
        batch.rows[0].1.push(SqlValue::Int(2));
        let config = WriterConfig::default();
        assert!(matches!(
            build_update_statements(&batch, &config),
            Err(WriterError::PrimaryKeyColumnUpdate(col)) if col == "id"
        ));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let mut batch = sample_update();
        batch.pk_columns.clear();
        let config = WriterConfig::default();
        assert!(matches!(
            build_update_statements(&batch, &config),
            Err(WriterError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn delete_renders_values_join() {
        let batch = DeleteBatch {
            schema: "dbo".to_string(),
            table: "orders".to_string(),
            pk_columns: vec!["id".to_string()],
            rows: vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
        };
        let config = WriterConfig::default();
        let statements = build_delete_statements(&batch, &config).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("DELETE t FROM [dbo].[orders] AS t"));
        assert!(statements[0].contains("VALUES (1), (2)"));
    }
}
