//! Top-level error type composing every layer beneath the extension surface.

use thiserror::Error;

/// Where in a multi-statement write a runtime error occurred, so the host
/// engine can report which rows were affected before the failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowContext {
    /// Index of the statement within the batch that failed.
    pub statement_index: usize,
    /// First row offset (inclusive) covered by that statement.
    pub row_offset_start: usize,
    /// Last row offset (exclusive) covered by that statement.
    pub row_offset_end: usize,
}

/// Errors surfaced by the extension-facing API.
#[derive(Debug, Error)]
pub enum ExtError {
    /// Lower-level connection/protocol error.
    #[error(transparent)]
    Client(#[from] mssql_client::Error),

    /// Pool acquisition/lifecycle error.
    #[error(transparent)]
    Pool(#[from] mssql_driver_pool::PoolError),

    /// Authentication error surfaced outside of a connection attempt (e.g.
    /// a secret-store lookup for an attach).
    #[error(transparent)]
    Auth(#[from] mssql_auth::AuthError),

    /// Value conversion error.
    #[error(transparent)]
    Type(#[from] mssql_types::TypeError),

    /// Catalog lookup error (metadata cache, primary-key discovery).
    #[error(transparent)]
    Catalog(#[from] mssql_catalog::CatalogError),

    /// Write-path builder/execution error.
    #[error(transparent)]
    Writer(#[from] mssql_writer::WriterError),

    /// An `ATTACH` request referenced a secret alias the configured
    /// `SecretStore` does not recognize.
    #[error("unknown secret: {0}")]
    UnknownSecret(String),

    /// An `ATTACH` connection string/URI could not be parsed.
    #[error("invalid attach target: {0}")]
    InvalidAttachTarget(String),

    /// A query-plan request referenced a handle that does not exist or was
    /// already closed.
    #[error("unknown handle: {0}")]
    UnknownHandle(u64),

    /// A DML statement failed partway through a multi-statement batch.
    #[error("write failed at statement {context:?}: {source}")]
    DmlRuntime {
        /// Progress context at the point of failure.
        context: RowContext,
        /// The underlying error.
        #[source]
        source: Box<ExtError>,
    },

    /// A plan-time error: the host requested an operation the catalog
    /// cannot support (e.g. inserting into a view, updating a PK-less
    /// table).
    #[error("cannot plan statement: {0}")]
    PlanTime(String),

    /// The operation was cancelled before completing.
    #[error("operation cancelled")]
    Cancelled,
}

impl ExtError {
    /// Attach row-progress context to an error from a failed write
    /// statement within a larger batch.
    #[must_use]
    pub fn with_row_context(self, context: RowContext) -> Self {
        ExtError::DmlRuntime {
            context,
            source: Box::new(self),
        }
    }

    /// Render this error the way it should reach the host engine: a stable
    /// `MSSQL: ` prefix so users can tell at a glance which extension raised
    /// it, regardless of which layer underneath actually failed.
    #[must_use]
    pub fn host_message(&self) -> String {
        format!("MSSQL: {self}")
    }
}
