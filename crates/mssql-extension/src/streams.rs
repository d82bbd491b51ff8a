//! Registry of open result streams, keyed by an opaque handle the host
//! engine can pass back across FFI/scalar-function calls (which cannot
//! carry a Rust lifetime).

use std::collections::HashMap;

use mssql_client::Row;
use parking_lot::Mutex;

use crate::error::ExtError;

/// An open scan's buffered rows and read cursor.
///
/// Rows are fully materialized up front (mirroring `mssql-client`'s
/// buffered-read-then-expose `ResultSet`) rather than streamed incrementally
/// off the socket; the registry's job is purely to let a host engine pull
/// rows a batch at a time across separate calls.
struct OpenStream {
    rows: Vec<Row>,
    cursor: usize,
}

/// A monotonically increasing handle identifying an open result stream.
pub type StreamHandle = u64;

/// Holds every currently-open result stream for one attached database.
#[derive(Default)]
pub struct ResultStreamRegistry {
    next_handle: Mutex<StreamHandle>,
    streams: Mutex<HashMap<StreamHandle, OpenStream>>,
}

impl ResultStreamRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fully materialized row set, returning its handle.
    pub fn open(&self, rows: Vec<Row>) -> StreamHandle {
        let mut next = self.next_handle.lock();
        let handle = *next;
        *next += 1;
        self.streams
            .lock()
            .insert(handle, OpenStream { rows, cursor: 0 });
        handle
    }

    /// Pull up to `max_rows` rows from an open stream, advancing its
    /// cursor. Returns an empty vector once the stream is exhausted.
    pub fn fetch(&self, handle: StreamHandle, max_rows: usize) -> Result<Vec<Row>, ExtError> {
        let mut streams = self.streams.lock();
        let stream = streams
            .get_mut(&handle)
            .ok_or(ExtError::UnknownHandle(handle))?;
        let end = (stream.cursor + max_rows).min(stream.rows.len());
        let batch = stream.rows[stream.cursor..end].to_vec();
        stream.cursor = end;
        Ok(batch)
    }

    /// Whether a stream has no more rows to fetch.
    pub fn is_exhausted(&self, handle: StreamHandle) -> Result<bool, ExtError> {
        let streams = self.streams.lock();
        let stream = streams
            .get(&handle)
            .ok_or(ExtError::UnknownHandle(handle))?;
        Ok(stream.cursor >= stream.rows.len())
    }

    /// Close a stream, freeing its buffered rows. Closing an already-closed
    /// or unknown handle is a no-op (matches the scalar-function `close`
    /// surface's idempotent-close contract).
    pub fn close(&self, handle: StreamHandle) {
        self.streams.lock().remove(&handle);
    }

    /// Number of currently open streams.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.streams.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_advances_cursor_and_exhausts() {
        let registry = ResultStreamRegistry::new();
        let handle = registry.open(Vec::new());
        assert!(registry.is_exhausted(handle).unwrap());
        registry.close(handle);
        assert!(registry.fetch(handle, 10).is_err());
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let registry = ResultStreamRegistry::new();
        assert!(matches!(
            registry.fetch(42, 10),
            Err(ExtError::UnknownHandle(42))
        ));
    }

    #[test]
    fn double_close_is_a_no_op() {
        let registry = ResultStreamRegistry::new();
        let handle = registry.open(Vec::new());
        registry.close(handle);
        registry.close(handle);
    }
}
