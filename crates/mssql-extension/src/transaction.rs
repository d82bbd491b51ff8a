//! Transaction lifecycle: lazy `BEGIN`, pinning a pooled connection for the
//! duration of a transaction, and release back to the pool on commit/
//! rollback/drop.

use mssql_client::transaction::IsolationLevel;
use mssql_client::{Client, Ready};
use mssql_driver_pool::{Pool, PooledConnection};
use tracing::{error, warn};

use crate::error::ExtError;

/// A transaction handle over a pinned pooled connection.
///
/// `BEGIN TRANSACTION` is not sent until the first statement is executed
/// through [`Transaction::begin_if_needed`] — a transaction opened and
/// immediately rolled back without ever running a statement never talks to
/// the server. The underlying pool connection is pinned (excluded from the
/// pool's idle-reclaim bookkeeping) for the transaction's entire lifetime
/// and unpinned again on commit, rollback, or drop.
///
/// Catalog-driven scans (by three-part name) are rejected while
/// [`is_active`](Self::is_active) is true; only scans issued via an explicit
/// SQL function are permitted, since this connection has no MARS and is
/// already pinned to the write path.
pub struct Transaction<'a> {
    pool: &'a Pool,
    conn: Option<PooledConnection>,
    isolation: IsolationLevel,
    started: bool,
    /// The 8-byte descriptor captured from `ENVCHANGE BEGIN_TRANS` once
    /// `begin_if_needed` has run. Zero until then.
    descriptor: u64,
}

impl<'a> Transaction<'a> {
    /// Check out a connection from `pool` and pin it for a transaction at
    /// the given isolation level. The `BEGIN` statement itself is deferred
    /// until the first statement runs.
    pub async fn open(pool: &'a Pool, isolation: IsolationLevel) -> Result<Transaction<'a>, ExtError> {
        let conn = pool.get().await?;
        pool.mark_pinned();
        Ok(Transaction {
            pool,
            conn: Some(conn),
            isolation,
            started: false,
            descriptor: 0,
        })
    }

    /// Whether this transaction has a server-side `BEGIN TRANSACTION`
    /// outstanding (i.e. `begin_if_needed` has run at least once).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.started
    }

    /// The transaction descriptor captured from `ENVCHANGE BEGIN_TRANS`,
    /// or `0` before the first statement runs.
    #[must_use]
    pub fn descriptor(&self) -> u64 {
        self.descriptor
    }

    /// Borrow the underlying connection, issuing `BEGIN TRANSACTION` first
    /// if this is the first use of the transaction. `get_connection`
    /// callers inside an active transaction must go through this method
    /// (or the already-begun connection it returns) rather than the pool.
    pub async fn begin_if_needed(&mut self) -> Result<&mut Client<Ready>, ExtError> {
        let conn = self
            .conn
            .as_mut()
            .expect("connection present until commit/rollback");
        if !self.started {
            let sql = format!("{}; BEGIN TRANSACTION;", self.isolation.as_sql());
            conn.simple_query(&sql).await?;
            self.descriptor = conn.transaction_descriptor();
            self.started = true;
        }
        Ok(&mut **conn)
    }

    /// Commit the transaction (a no-op `COMMIT` is skipped if no statement
    /// was ever run) and unpin the connection, returning it to the pool.
    pub async fn commit(mut self) -> Result<(), ExtError> {
        if self.started {
            let conn = self.conn.as_mut().expect("connection present");
            conn.simple_query("COMMIT TRANSACTION;").await?;
            Self::verify_trancount_zero(conn).await?;
        }
        self.finish();
        Ok(())
    }

    /// Roll back the transaction and unpin the connection.
    ///
    /// A post-rollback `@@TRANCOUNT` that has not returned to zero indicates
    /// a server-side nested transaction (e.g. opened by a stored procedure)
    /// this driver cannot reconcile; in that case the connection is closed
    /// rather than returned to the pool.
    pub async fn rollback(mut self) -> Result<(), ExtError> {
        if self.started {
            let conn = self.conn.as_mut().expect("connection present");
            conn.simple_query("ROLLBACK TRANSACTION;").await?;
            if let Err(e) = Self::verify_trancount_zero(conn).await {
                error!(
                    error = %e,
                    "@@TRANCOUNT did not return to zero after ROLLBACK; closing connection \
                     rather than returning it to the pool"
                );
                self.close_instead_of_release();
                return Ok(());
            }
        }
        self.finish();
        Ok(())
    }

    /// Query `@@TRANCOUNT` and fail if it is not zero.
    async fn verify_trancount_zero(conn: &mut Client<Ready>) -> Result<(), ExtError> {
        let rows = conn
            .query("SELECT @@TRANCOUNT AS tc;", &[])
            .await?
            .collect_all()
            .await?;
        let trancount: i32 = rows
            .first()
            .and_then(|r| r.try_get_by_name::<i32>("tc"))
            .unwrap_or(0);
        if trancount != 0 {
            return Err(ExtError::PlanTime(format!(
                "@@TRANCOUNT is {trancount} after transaction end, expected 0 \
                 (likely a server-side nested transaction)"
            )));
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.pool.mark_unpinned();
        self.conn = None;
    }

    /// Discard the pooled connection instead of letting it return to the
    /// idle queue.
    fn close_instead_of_release(&mut self) {
        self.pool.mark_unpinned();
        if let Some(conn) = self.conn.take() {
            conn.discard();
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            self.pool.mark_unpinned();
            if self.started {
                warn!(
                    "transaction dropped without explicit commit/rollback; \
                     attempting best-effort ROLLBACK before releasing the connection"
                );
                tokio::spawn(async move {
                    if conn.simple_query("ROLLBACK TRANSACTION;").await.is_err() {
                        warn!("best-effort rollback on abandoned transaction failed; connection will be closed");
                        conn.discard();
                    }
                    // else: PooledConnection's own Drop returns/resets it normally.
                });
            }
        }
    }
}
