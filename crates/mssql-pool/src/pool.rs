//! Connection pool implementation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use mssql_client::{Client, Config, Ready};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::ConnectionMetadata;

/// A connection pool for SQL Server.
///
/// The pool manages a set of database connections, providing automatic
/// connection reuse, health checking, and lifecycle management.
///
/// Pool size (idle + in-use connections together) is bounded by
/// `PoolConfig::max_connections` via a semaphore: a permit is acquired when
/// a connection is created and held for that connection's entire physical
/// lifetime (idle or checked out), released only when the connection is
/// actually closed. This keeps `created - closed == idle + active` as an
/// invariant regardless of checkout/checkin traffic. A background task
/// periodically sweeps idle connections that have exceeded `idle_timeout`
/// or `max_lifetime`.
pub struct Pool {
    config: PoolConfig,
    inner: Arc<PoolInner>,
}

struct PoolInner {
    conn_config: Config,
    pool_config: PoolConfig,
    idle: Mutex<VecDeque<PoolEntry>>,
    semaphore: Arc<Semaphore>,
    next_id: AtomicU64,
    closed: AtomicBool,
    metrics: MetricsInner,
    pinned_count: AtomicU32,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// A physical connection plus its pool bookkeeping, including the semaphore
/// permit that reserves its slot for as long as the connection exists.
struct PoolEntry {
    client: Client<Ready>,
    metadata: ConnectionMetadata,
    permit: OwnedSemaphorePermit,
}

#[derive(Default)]
struct MetricsInner {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    acquire_count: AtomicU64,
    acquire_timeout_count: AtomicU64,
    acquire_wait_total_ms: AtomicU64,
    health_checks_performed: AtomicU64,
    health_checks_failed: AtomicU64,
    resets_performed: AtomicU64,
    resets_failed: AtomicU64,
}

impl Pool {
    /// Create a new pool and start its background idle-sweep task.
    ///
    /// This validates `pool_config`, but does not eagerly establish
    /// `min_connections` connections synchronously; connections up to the
    /// floor are created opportunistically right after construction so a
    /// slow or unreachable server doesn't block `Pool::new` itself.
    pub async fn new(pool_config: PoolConfig, conn_config: Config) -> Result<Self, PoolError> {
        pool_config.validate()?;

        let inner = Arc::new(PoolInner {
            conn_config,
            pool_config: pool_config.clone(),
            idle: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(pool_config.max_connections as usize)),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            metrics: MetricsInner::default(),
            pinned_count: AtomicU32::new(0),
            sweeper: Mutex::new(None),
        });

        let sweeper = tokio::spawn(Self::idle_sweep_loop(Arc::clone(&inner)));
        *inner.sweeper.lock() = Some(sweeper);

        let pool = Self {
            config: pool_config,
            inner,
        };

        pool.fill_to_minimum().await;

        Ok(pool)
    }

    /// Opportunistically create connections up to `min_connections`.
    ///
    /// Failures are logged and otherwise ignored: a pool that can't reach
    /// its floor yet should still be usable for `get()`, which retries
    /// connection creation on demand.
    async fn fill_to_minimum(&self) {
        let deficit = {
            let idle = self.inner.idle.lock();
            self.config.min_connections.saturating_sub(idle.len() as u32)
        };

        for _ in 0..deficit {
            let Ok(Ok(permit)) = tokio::time::timeout(
                self.config.connection_timeout,
                Arc::clone(&self.inner.semaphore).acquire_owned(),
            )
            .await
            else {
                break;
            };

            match self.inner.create_connection(permit).await {
                Ok(entry) => self.inner.idle.lock().push_back(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to pre-warm pool connection");
                    break;
                }
            }
        }
    }

    async fn idle_sweep_loop(inner: Arc<PoolInner>) {
        let mut interval = tokio::time::interval(inner.pool_config.health_check_interval);
        loop {
            interval.tick().await;
            if inner.closed.load(Ordering::Acquire) {
                return;
            }
            inner.sweep_idle().await;
        }
    }

    /// Get a connection from the pool.
    ///
    /// This will either return an existing idle connection or create a new
    /// one if the pool is not at capacity. If all connections are in use and
    /// the pool is at capacity, this waits (up to `connection_timeout`) for a
    /// connection slot to free up.
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!("acquiring connection from pool");
        self.inner.metrics.acquire_count.fetch_add(1, Ordering::Relaxed);
        let wait_start = Instant::now();

        let entry = loop {
            if let Some(mut entry) = self.inner.idle.lock().pop_front() {
                if entry.metadata.is_expired(self.config.max_lifetime) {
                    self.inner.close_entry(entry).await;
                    continue;
                }

                if self.config.test_on_checkout {
                    self.inner
                        .metrics
                        .health_checks_performed
                        .fetch_add(1, Ordering::Relaxed);
                    if let Err(err) = Self::health_check(&mut entry.client, &self.config).await {
                        self.inner
                            .metrics
                            .health_checks_failed
                            .fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %err, "idle connection failed health check, discarding");
                        self.inner.close_entry(entry).await;
                        continue;
                    }
                    entry.metadata.mark_health_check();
                }

                break entry;
            }

            let permit = match tokio::time::timeout(
                self.config.connection_timeout,
                Arc::clone(&self.inner.semaphore).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(PoolError::PoolClosed),
                Err(_) => {
                    self.inner
                        .metrics
                        .acquire_timeout_count
                        .fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::AcquisitionTimeout(self.config.connection_timeout));
                }
            };

            break self.inner.create_connection(permit).await?;
        };

        self.inner.metrics.acquire_wait_total_ms.fetch_add(
            wait_start.elapsed().as_millis() as u64,
            Ordering::Relaxed,
        );

        let PoolEntry {
            client,
            mut metadata,
            permit,
        } = entry;
        metadata.mark_checkout();

        Ok(PooledConnection {
            inner: Arc::clone(&self.inner),
            client: Some(client),
            metadata: Some(metadata),
            permit: Some(permit),
            detached: false,
        })
    }

    async fn health_check(client: &mut Client<Ready>, config: &PoolConfig) -> Result<(), PoolError> {
        client
            .simple_query(config.health_check_query.as_ref())
            .await
            .map_err(|e| PoolError::UnhealthyConnection(e.to_string()))
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let idle = self.inner.idle.lock().len() as u32;
        let available_permits = self.inner.semaphore.available_permits() as u32;
        let total = self.config.max_connections.saturating_sub(available_permits);
        PoolStatus {
            available: idle,
            in_use: total.saturating_sub(idle),
            total,
            max: self.config.max_connections,
            pinned: self.inner.pinned_count.load(Ordering::Relaxed),
        }
    }

    /// Get cumulative pool metrics since creation.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let m = &self.inner.metrics;
        PoolMetrics {
            connections_created: m.connections_created.load(Ordering::Relaxed),
            connections_closed: m.connections_closed.load(Ordering::Relaxed),
            acquire_count: m.acquire_count.load(Ordering::Relaxed),
            acquire_timeout_count: m.acquire_timeout_count.load(Ordering::Relaxed),
            acquire_wait_total_ms: m.acquire_wait_total_ms.load(Ordering::Relaxed),
            health_checks_performed: m.health_checks_performed.load(Ordering::Relaxed),
            health_checks_failed: m.health_checks_failed.load(Ordering::Relaxed),
            resets_performed: m.resets_performed.load(Ordering::Relaxed),
            resets_failed: m.resets_failed.load(Ordering::Relaxed),
        }
    }

    /// Number of connections currently pinned to an in-progress transaction.
    ///
    /// Pinned connections are checked out but bypass the idle queue entirely
    /// for the lifetime of the transaction; see `mssql-extension::transaction`.
    #[must_use]
    pub fn pinned_count(&self) -> u32 {
        self.inner.pinned_count.load(Ordering::Relaxed)
    }

    /// Mark a connection as pinned, leaving the pool's managed rotation for
    /// the duration of a transaction. Called by the transaction manager.
    pub fn mark_pinned(&self) {
        self.inner.pinned_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a previously pinned connection as released back to normal
    /// rotation.
    pub fn mark_unpinned(&self) {
        self.inner.pinned_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Close the pool, dropping all idle connections and preventing further
    /// acquisition. Connections already checked out finish their own
    /// lifetime and are closed rather than returned when dropped.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);

        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }

        let entries: Vec<_> = self.inner.idle.lock().drain(..).collect();
        for entry in entries {
            self.inner.close_entry(entry).await;
        }

        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl PoolInner {
    async fn create_connection(&self, permit: OwnedSemaphorePermit) -> Result<PoolEntry, PoolError> {
        let client = Client::connect(self.conn_config.clone())
            .await
            .map_err(|e| PoolError::ConnectionCreation(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.metrics.connections_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = id, "created new pool connection");

        Ok(PoolEntry {
            client,
            metadata: ConnectionMetadata::new(id),
            permit,
        })
    }

    async fn close_entry(&self, entry: PoolEntry) {
        self.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = entry.client.close().await {
            tracing::debug!(error = %err, "error closing pool connection");
        }
        // entry.permit drops here, releasing the slot back to the semaphore.
    }

    async fn sweep_idle(&self) {
        let expired: Vec<PoolEntry> = {
            let mut idle = self.idle.lock();
            let mut kept = VecDeque::with_capacity(idle.len());
            let mut expired = Vec::new();
            for entry in idle.drain(..) {
                if entry.metadata.is_idle_expired(self.pool_config.idle_timeout)
                    || entry.metadata.is_expired(self.pool_config.max_lifetime)
                {
                    expired.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            *idle = kept;
            expired
        };

        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "idle sweep removed expired connections");
        }
        for entry in expired {
            self.close_entry(entry).await;
        }
    }
}

/// Status information about the pool at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections (idle + in use).
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
    /// Number of connections currently pinned to a transaction.
    pub pinned: u32,
}

impl PoolStatus {
    /// Percentage of `max` currently in use, in the range `0.0..=100.0`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }
}

/// Cumulative pool metrics since the pool was created.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetrics {
    /// Total connections created over the pool's lifetime.
    pub connections_created: u64,
    /// Total connections closed (idle-swept, unhealthy, or on pool close).
    pub connections_closed: u64,
    /// Total `get()` calls.
    pub acquire_count: u64,
    /// Total `get()` calls that timed out waiting for a permit.
    pub acquire_timeout_count: u64,
    /// Cumulative time spent waiting for a permit, in milliseconds.
    pub acquire_wait_total_ms: u64,
    /// Total health checks performed.
    pub health_checks_performed: u64,
    /// Total health checks that failed.
    pub health_checks_failed: u64,
    /// Total `sp_reset_connection` resets performed on return.
    pub resets_performed: u64,
    /// Total resets that failed (connection was discarded instead).
    pub resets_failed: u64,
}

impl PoolMetrics {
    /// Fraction of `acquire_count` that did not time out, in `0.0..=1.0`.
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        if self.acquire_count == 0 {
            return 1.0;
        }
        let failed = self.acquire_timeout_count as f64;
        1.0 - (failed / self.acquire_count as f64)
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is returned to the pool: a reset task
/// (`sp_reset_connection`, if `PoolConfig::sp_reset_connection` is set) is
/// spawned and the connection is pushed back onto the idle queue when it
/// completes. If the reset fails, the connection is closed instead of
/// returned, releasing its permit back to the semaphore.
pub struct PooledConnection {
    inner: Arc<PoolInner>,
    client: Option<Client<Ready>>,
    metadata: Option<ConnectionMetadata>,
    permit: Option<OwnedSemaphorePermit>,
    detached: bool,
}

impl PooledConnection {
    /// Detach the connection from the pool.
    ///
    /// The connection will not be returned to the pool when dropped and its
    /// slot is released immediately; the caller becomes responsible for
    /// closing the returned client.
    #[must_use]
    pub fn detach(mut self) -> Client<Ready> {
        self.detached = true;
        self.permit.take();
        self.client.take().expect("client present until drop")
    }

    /// Discard this connection instead of returning it to the pool.
    ///
    /// Unlike [`detach`](Self::detach), this keeps the pool's bookkeeping
    /// consistent: `connections_closed` is incremented so
    /// `created - closed == idle + active` still holds, and the
    /// connection's `Close` message is sent before its permit is released.
    /// Callers use this when they observe state that makes the connection
    /// unsafe to reuse even though it isn't `Dirty` in the protocol sense —
    /// e.g. a transaction whose `@@TRANCOUNT` did not return to zero after
    /// `ROLLBACK`.
    pub fn discard(mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        self.metadata.take();
        let Some(permit) = self.permit.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner
                .metrics
                .connections_closed
                .fetch_add(1, Ordering::Relaxed);
            if let Err(err) = client.close().await {
                tracing::debug!(error = %err, "error closing discarded pool connection");
            }
            drop(permit);
        });
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Client<Ready>;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("client present until drop")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("client present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.detached {
            return;
        }

        let Some(client) = self.client.take() else {
            return;
        };
        let Some(mut metadata) = self.metadata.take() else {
            return;
        };
        let Some(permit) = self.permit.take() else {
            return;
        };

        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            if inner.closed.load(Ordering::Acquire) {
                inner
                    .close_entry(PoolEntry {
                        client,
                        metadata,
                        permit,
                    })
                    .await;
                return;
            }

            let mut client = client;
            if inner.pool_config.sp_reset_connection {
                match client.simple_query("EXEC sp_reset_connection").await {
                    Ok(()) => {
                        inner.metrics.resets_performed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        inner.metrics.resets_failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %err, "sp_reset_connection failed, discarding connection");
                        inner
                            .close_entry(PoolEntry {
                                client,
                                metadata,
                                permit,
                            })
                            .await;
                        return;
                    }
                }
            }

            metadata.mark_checkin();
            inner.idle.lock().push_back(PoolEntry {
                client,
                metadata,
                permit,
            });
            tracing::trace!("returned connection to pool");
        });
    }
}
