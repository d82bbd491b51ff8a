//! Streaming query result support.
//!
//! This module provides result sets for memory-efficient processing of query
//! results. A single TDS response is read in full and parsed into one or more
//! [`ResultSet`]s (see [`crate::client::Client::read_multi_result_response`]);
//! [`QueryStream`] then hands rows out of the buffered set one at a time
//! through the [`Stream`] trait, so callers that only need the first few rows
//! never pay to materialize a `Vec<Row>`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::Error;
use crate::row::{Column, Row};

/// One result set: the column metadata and rows produced by a single
/// `SELECT`/`COLMETADATA` section of a batch response.
#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Create a result set from parsed columns and rows.
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column metadata for this result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows in this result set.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Take ownership of the rows, consuming this result set.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// A streaming result set from a query.
///
/// The rows backing a `QueryStream` are already buffered in memory (the full
/// TDS response is read before this type is constructed); the `Stream`
/// implementation exists so callers can process rows incrementally without
/// collecting them into a `Vec` first, and so cancellation / early
/// termination doesn't need special casing.
pub struct QueryStream<'a> {
    /// Column metadata for the result set.
    columns: Vec<Column>,
    /// Buffered rows not yet yielded.
    rows: VecDeque<Row>,
    /// Lifetime tied to the connection.
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> QueryStream<'a> {
    /// Create a new query stream from parsed columns and rows.
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the column metadata for this result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Check if the stream has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows remaining to be yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Collect all remaining rows into a vector.
    ///
    /// For large result sets, consider iterating with the stream instead.
    pub async fn collect_all(mut self) -> Result<Vec<Row>, Error> {
        Ok(self.rows.drain(..).collect())
    }
}

impl Stream for QueryStream<'_> {
    type Item = Result<Row, Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Poll::Ready(this.rows.pop_front().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

/// Result of a non-query execution.
///
/// Contains the number of affected rows and any output parameters.
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    /// Number of rows affected by the statement.
    pub rows_affected: u64,
    /// Output parameters from stored procedures.
    pub output_params: Vec<OutputParam>,
}

/// An output parameter from a stored procedure call.
#[derive(Debug, Clone)]
pub struct OutputParam {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: mssql_types::SqlValue,
}

impl ExecuteResult {
    /// Create a new execute result.
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            output_params: Vec::new(),
        }
    }

    /// Create a result with output parameters.
    pub fn with_outputs(rows_affected: u64, output_params: Vec<OutputParam>) -> Self {
        Self {
            rows_affected,
            output_params,
        }
    }

    /// Get an output parameter by name.
    #[must_use]
    pub fn get_output(&self, name: &str) -> Option<&OutputParam> {
        self.output_params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Multiple result sets from a batch or stored procedure.
///
/// Some queries return multiple result sets (e.g., stored procedures
/// with multiple SELECT statements, or `SELECT` batches separated by `;`).
pub struct MultiResultStream<'a> {
    /// All result sets from the batch, in order.
    result_sets: Vec<ResultSet>,
    /// Current result set index.
    current_result: usize,
    /// Rows not yet yielded from the current result set.
    current_rows: VecDeque<Row>,
    /// Lifetime tied to the connection.
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> MultiResultStream<'a> {
    /// Create a new multi-result stream from already-parsed result sets.
    pub(crate) fn new(result_sets: Vec<ResultSet>) -> Self {
        let current_rows = result_sets
            .first()
            .map(|rs| rs.rows.clone().into())
            .unwrap_or_default();

        Self {
            result_sets,
            current_result: 0,
            current_rows,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the current result set index (0-based).
    #[must_use]
    pub fn current_result_index(&self) -> usize {
        self.current_result
    }

    /// Total number of result sets in this batch.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.result_sets.len()
    }

    /// Column metadata for the current result set, if any.
    #[must_use]
    pub fn current_columns(&self) -> Option<&[Column]> {
        self.result_sets
            .get(self.current_result)
            .map(|rs| rs.columns())
    }

    /// Move to the next result set.
    ///
    /// Returns `true` if there is another result set, `false` if no more.
    /// Any unread rows in the current result set are discarded, matching
    /// SQL Server client behavior when a caller moves on without draining.
    pub async fn next_result(&mut self) -> Result<bool, Error> {
        let next_index = self.current_result + 1;
        if next_index >= self.result_sets.len() {
            self.current_result = self.result_sets.len();
            self.current_rows.clear();
            return Ok(false);
        }

        self.current_result = next_index;
        self.current_rows = self.result_sets[next_index].rows.clone().into();
        Ok(true)
    }

    /// Get the next row from the current result set.
    pub async fn next_row(&mut self) -> Result<Option<Row>, Error> {
        Ok(self.current_rows.pop_front())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn sample_columns() -> Vec<Column> {
        vec![Column::new("id", 0, "INT")]
    }

    fn sample_row(id: i32) -> Row {
        Row::from_values(sample_columns(), vec![mssql_types::SqlValue::Int(id)])
    }

    #[test]
    fn test_execute_result() {
        let result = ExecuteResult::new(42);
        assert_eq!(result.rows_affected, 42);
        assert!(result.output_params.is_empty());
    }

    #[test]
    fn test_execute_result_with_outputs() {
        let outputs = vec![OutputParam {
            name: "ReturnValue".to_string(),
            value: mssql_types::SqlValue::Int(100),
        }];

        let result = ExecuteResult::with_outputs(10, outputs);
        assert_eq!(result.rows_affected, 10);
        assert!(result.get_output("ReturnValue").is_some());
        assert!(result.get_output("returnvalue").is_some()); // case-insensitive
        assert!(result.get_output("NotFound").is_none());
    }

    #[test]
    fn test_query_stream_columns() {
        let stream = QueryStream::new(sample_columns(), Vec::new());
        assert_eq!(stream.columns().len(), 1);
        assert_eq!(stream.columns()[0].name, "id");
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn test_query_stream_yields_buffered_rows_in_order() {
        let rows = vec![sample_row(1), sample_row(2), sample_row(3)];
        let mut stream = QueryStream::new(sample_columns(), rows);

        let mut seen = Vec::new();
        while let Some(row) = stream.next().await {
            seen.push(row.unwrap().get::<i32>(0).unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_query_stream_collect_all() {
        let rows = vec![sample_row(1), sample_row(2)];
        let stream = QueryStream::new(sample_columns(), rows);
        let collected = stream.collect_all().await.unwrap();
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn test_multi_result_stream_advances_across_result_sets() {
        let result_sets = vec![
            ResultSet::new(sample_columns(), vec![sample_row(1), sample_row(2)]),
            ResultSet::new(sample_columns(), vec![sample_row(3)]),
        ];
        let mut multi = MultiResultStream::new(result_sets);

        assert_eq!(multi.current_result_index(), 0);
        assert_eq!(multi.next_row().await.unwrap().unwrap().get::<i32>(0).unwrap(), 1);
        assert_eq!(multi.next_row().await.unwrap().unwrap().get::<i32>(0).unwrap(), 2);
        assert!(multi.next_row().await.unwrap().is_none());

        assert!(multi.next_result().await.unwrap());
        assert_eq!(multi.current_result_index(), 1);
        assert_eq!(multi.next_row().await.unwrap().unwrap().get::<i32>(0).unwrap(), 3);

        assert!(!multi.next_result().await.unwrap());
    }
}
