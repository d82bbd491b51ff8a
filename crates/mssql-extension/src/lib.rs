//! # mssql-extension
//!
//! The integration surface a host query engine binds against: resolving an
//! `ATTACH` target to a connection, a catalog handle for planning scans and
//! writes against [`mssql_catalog`]/[`mssql_pushdown`]/[`mssql_writer`],
//! transaction lifecycle management with lazy `BEGIN` and connection
//! pinning, a registry of open result streams, and the small set of scalar
//! functions a host binds directly.
//!
//! This crate owns no wire protocol or catalog logic itself — it composes
//! the lower crates in the workspace into the shape an embedding engine
//! expects, the same way `mssql-client` composes
//! `tds-protocol`/`mssql-codec`/`mssql-auth`/`mssql-tls` into a single
//! client API.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod attach;
pub mod catalog;
pub mod error;
pub mod functions;
pub mod streams;
pub mod transaction;

pub use attach::{parse_attach, AttachTarget, CatalogSettings, SecretRecord, SecretStore};
pub use catalog::{CatalogHandle, TableScanPlan};
pub use error::{ExtError, RowContext};
pub use streams::{ResultStreamRegistry, StreamHandle};
pub use transaction::Transaction;
