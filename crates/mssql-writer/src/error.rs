//! Error type for the write path.

use thiserror::Error;

/// Errors raised while building or executing a write statement.
#[derive(Debug, Error)]
pub enum WriterError {
    /// A batch carried no rows.
    #[error("batch has no rows to write")]
    EmptyBatch,

    /// An `UPDATE`/`DELETE`/CTAS batch was built against a table with no
    /// declared primary key.
    #[error("table {schema}.{table} has no primary key; row-targeted writes require one")]
    MissingPrimaryKey {
        /// Target schema.
        schema: String,
        /// Target table.
        table: String,
    },

    /// An `UPDATE` batch attempted to assign a value to a primary-key
    /// column. Primary keys identify the row being updated and cannot be
    /// changed by the same statement that targets them.
    #[error("column {0} is part of the primary key and cannot be updated")]
    PrimaryKeyColumnUpdate(String),

    /// A row's value count did not match the batch's declared column count.
    #[error("row {row_index} has {actual} values, expected {expected}")]
    ArityMismatch {
        /// Index of the offending row.
        row_index: usize,
        /// Expected value count.
        expected: usize,
        /// Actual value count.
        actual: usize,
    },

    /// A single row's rendered literal text alone exceeds the configured
    /// per-statement byte cap. Unlike the row-count/byte-size batch splits,
    /// this cannot be resolved by starting a new statement: the row is
    /// rejected rather than silently emitted as an oversized statement.
    #[error(
        "row {row_index} renders to {size} bytes, which exceeds the \
         {limit}-byte statement limit on its own"
    )]
    RowTooLarge {
        /// Index of the offending row.
        row_index: usize,
        /// Rendered size of the row (including its `VALUES` prefix), in
        /// bytes.
        size: usize,
        /// The configured `max_bytes_per_batch` limit.
        limit: usize,
    },

    /// A value could not be rendered as a T-SQL literal (e.g. NaN/Inf, or an
    /// XML value passed where a scalar literal is required).
    #[error(transparent)]
    Literal(#[from] mssql_types::TypeError),

    /// The underlying connection reported an error executing a generated
    /// statement.
    #[error(transparent)]
    Client(#[from] mssql_client::Error),

    /// Catalog lookup (primary key discovery) failed.
    #[error(transparent)]
    Catalog(#[from] mssql_catalog::CatalogError),
}
