//! Batch-sizing configuration shared by every write path.

/// Default maximum rows per generated `VALUES` list, chosen to stay well
/// clear of T-SQL's 1,000-row `VALUES` constructor limit and SQL Server's
/// 2,100 parameter ceiling.
pub const DEFAULT_MAX_ROWS_PER_BATCH: usize = 1000;

/// Default maximum rendered-SQL size per batch, in bytes, chosen to stay
/// under the default `max_text_size` a batch statement can safely carry.
pub const DEFAULT_MAX_BYTES_PER_BATCH: usize = 8 * 1024 * 1024;

/// Controls how rows are split across generated statements.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Maximum rows rendered into a single `VALUES (...), (...)` list.
    pub max_rows_per_batch: usize,
    /// Maximum rendered SQL text size (bytes) per statement.
    pub max_bytes_per_batch: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_rows_per_batch: DEFAULT_MAX_ROWS_PER_BATCH,
            max_bytes_per_batch: DEFAULT_MAX_BYTES_PER_BATCH,
        }
    }
}
