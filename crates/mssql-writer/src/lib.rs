//! # mssql-writer
//!
//! Builders and executors for the write side of a host query engine: batched
//! `INSERT`/`UPDATE`/`DELETE` rendered as literal T-SQL text (not bound
//! parameters, since a single statement can carry hundreds of rows), and a
//! two-phase `CREATE TABLE AS SELECT`.
//!
//! Every builder function (`build_*_statements`) is pure and synchronous —
//! it never touches a connection — so callers can inspect or log the
//! generated SQL before running it. The paired `execute_*` functions run the
//! generated statements over a borrowed `&mut mssql_client::Client<Ready>`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod ctas;
pub mod error;
pub mod insert;
pub mod update_delete;

pub use config::WriterConfig;
pub use ctas::{build_ddl, execute_create_table_as, ColumnDef, CreateTableAsSelect, CreateTableOutcome};
pub use error::WriterError;
pub use insert::{build_statements as build_insert_statements, execute_insert, InsertBatch, InsertOutcome};
pub use update_delete::{
    build_delete_statements, build_update_statements, execute_delete, execute_update, DeleteBatch,
    UpdateBatch,
};
