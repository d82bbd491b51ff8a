//! # mssql-catalog
//!
//! Metadata cache, primary-key discovery, and visibility filters for a SQL
//! Server catalog attached to a host query engine.
//!
//! This crate owns no connections of its own: every operation takes a
//! `&mut mssql_client::Client<mssql_client::Ready>` borrowed from the caller
//! (typically a pooled or pinned connection), issues discovery SQL over it,
//! and caches the result. Rowid identity is derived exclusively from a
//! table's declared primary key (see [`primary_key::RowId`]); physical row
//! locators are not used.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod error;
pub mod filter;
pub mod primary_key;
pub mod queries;

pub use cache::{ColumnInfo, LoadState, MetadataCache, ObjectKind};
pub use error::CatalogError;
pub use filter::CatalogFilter;
pub use primary_key::{PrimaryKeyColumn, PrimaryKeyInfo, RowId, RowIdError};
