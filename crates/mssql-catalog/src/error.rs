//! Catalog-layer error types.

use thiserror::Error;

/// Errors raised while discovering or caching catalog metadata.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A schema, table, or view name did not resolve, either because it
    /// genuinely does not exist or because a visibility filter hides it.
    /// Per the filtering contract, both cases present identically.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What kind of object was being looked up (`"schema"`, `"table"`).
        kind: &'static str,
        /// The fully-qualified or simple name that was looked up.
        name: String,
    },

    /// The named object exists but is not the kind of object the caller
    /// expected (e.g. a view where a table was required for DML).
    #[error("'{name}' is not a {expected}")]
    WrongObjectType {
        /// The object name.
        name: String,
        /// What the caller required it to be.
        expected: &'static str,
    },

    /// The table has no primary key, and the requested operation requires one.
    #[error("UPDATE/DELETE requires a primary key")]
    MissingPrimaryKey,

    /// Rowid derivation was attempted against a view, which has no declared
    /// primary key concept in this model.
    #[error("rowid not supported for views")]
    RowidOnView,

    /// A regex-based visibility filter failed to compile at attach time.
    #[error("invalid filter pattern: {0}")]
    InvalidFilterPattern(#[from] regex::Error),

    /// The underlying connection failed while running a discovery query.
    #[error(transparent)]
    Client(#[from] mssql_client::Error),

    /// A discovery query returned a row that could not be decoded into the
    /// expected catalog shape.
    #[error("malformed discovery result: {0}")]
    MalformedResult(String),
}
