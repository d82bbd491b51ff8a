//! Outbound scalar-function surface: the small set of operations a host
//! engine invokes directly (as opposed to the catalog/write paths, which are
//! planned and then executed by the caller).
//!
//! These are thin wrappers kept deliberately free of business logic — each
//! one delegates to [`crate::catalog::CatalogHandle`],
//! [`crate::streams::ResultStreamRegistry`], or the pool directly — so the
//! surface a host engine binds against stays small and stable even as the
//! planning logic underneath it changes.

use mssql_client::{Client, Ready};
use mssql_driver_pool::{Pool, PoolStatus};

use crate::catalog::CatalogHandle;
use crate::error::ExtError;
use crate::streams::{ResultStreamRegistry, StreamHandle};

/// The driver's own version string, for a host engine's `version()` scalar
/// function.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Run a statement with no result set expected, returning rows affected.
pub async fn exec(conn: &mut Client<Ready>, sql: &str) -> Result<u64, ExtError> {
    Ok(conn.execute(sql, &[]).await?)
}

/// Run a query, materialize its rows, and register them for cursor-style
/// fetching, returning the new stream's handle.
pub async fn open_scan(
    conn: &mut Client<Ready>,
    registry: &ResultStreamRegistry,
    sql: &str,
) -> Result<StreamHandle, ExtError> {
    let mut stream = conn.query(sql, &[]).await?;
    let rows = stream.collect_all().await?;
    Ok(registry.open(rows))
}

/// Fetch the next batch of rows from an open scan.
pub fn scan_fetch(
    registry: &ResultStreamRegistry,
    handle: StreamHandle,
    max_rows: usize,
) -> Result<Vec<mssql_client::Row>, ExtError> {
    registry.fetch(handle, max_rows)
}

/// Close an open scan, freeing its buffered rows.
pub fn close_scan(registry: &ResultStreamRegistry, handle: StreamHandle) {
    registry.close(handle);
}

/// Health check: round-trip a trivial query over the connection.
pub async fn ping(conn: &mut Client<Ready>) -> Result<(), ExtError> {
    conn.execute("SELECT 1;", &[]).await?;
    Ok(())
}

/// Snapshot of pool occupancy, for a host engine's observability surface.
#[must_use]
pub fn pool_stats(pool: &Pool) -> PoolStatus {
    pool.status()
}

/// Force the next catalog lookup to re-query the server.
pub fn refresh_cache(handle: &CatalogHandle) {
    handle.invalidate_cache();
}

/// Eagerly load the whole catalog in one round trip.
pub async fn preload_catalog(handle: &CatalogHandle, conn: &mut Client<Ready>) -> Result<(), ExtError> {
    handle.preload_catalog(conn).await
}
