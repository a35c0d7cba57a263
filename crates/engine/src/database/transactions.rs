//! Write transactions and bounded commit retry
//!
//! Every mutation runs inside one `BEGIN IMMEDIATE ... COMMIT` unit held by
//! a [`WriteTxn`] guard. Transient engine failures (`SQLITE_BUSY`,
//! `SQLITE_LOCKED`) on begin or commit are retried per [`RetryConfig`];
//! anything else propagates at once. A guard dropped before commit rolls
//! back, so schema changes and row writes land together or not at all.

use juntdb_core::{Error, Result};
use rusqlite::{Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

// ============================================================================
// Retry Configuration
// ============================================================================

/// Configuration for commit retry behavior
///
/// `max_retries` counts retries after the first attempt, so the default of 3
/// gives 4 attempts in total.
///
/// # Example
/// ```
/// use juntdb_engine::RetryConfig;
///
/// let config = RetryConfig::new().with_max_retries(5).with_base_delay_ms(2);
/// assert_eq!(config.attempts(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Total attempts, first try included
    pub fn attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Calculate delay for a given attempt (exponential backoff)
    pub(crate) fn calculate_delay(&self, attempt: usize) -> Duration {
        // Cap the shift to prevent overflow (1 << 63 is the max for u64)
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

// ============================================================================
// Engine error classification
// ============================================================================

/// Lock contention that may clear on its own
pub(crate) fn is_transient(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Primary-key uniqueness violation on the identity column
pub(crate) fn is_identity_collision(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::ConstraintViolation
                && f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Run `op`, retrying transient failures per `config`
///
/// Exhausting the budget yields `CommitFailed`; non-transient errors map to
/// `Storage` without retry.
pub(crate) fn retry_transient<T>(
    config: &RetryConfig,
    what: &'static str,
    mut op: impl FnMut() -> rusqlite::Result<T>,
) -> Result<T> {
    let attempts = config.attempts();
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(Error::CommitFailed {
                        attempts,
                        reason: e.to_string(),
                    });
                }
                warn!(
                    target: "juntdb::retry",
                    op = what,
                    attempt,
                    error = %e,
                    "transient engine failure, retrying"
                );
                std::thread::sleep(config.calculate_delay(attempt - 1));
            }
            Err(e) => return Err(Error::storage(e)),
        }
    }
}

// ============================================================================
// WriteTxn
// ============================================================================

/// Guard over one immediate write transaction
///
/// Rolls back on drop unless [`WriteTxn::commit`] succeeded.
pub(crate) struct WriteTxn<'c> {
    conn: &'c Connection,
    finished: bool,
}

impl<'c> WriteTxn<'c> {
    /// Take the write lock, retrying while another writer holds it
    pub(crate) fn begin(conn: &'c Connection, config: &RetryConfig) -> Result<Self> {
        retry_transient(config, "begin", || conn.execute_batch("BEGIN IMMEDIATE"))?;
        Ok(WriteTxn {
            conn,
            finished: false,
        })
    }

    /// Commit, retrying transient failures
    pub(crate) fn commit(mut self, config: &RetryConfig) -> Result<()> {
        retry_transient(config, "commit", || self.conn.execute_batch("COMMIT"))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(target: "juntdb::retry", error = %e, "rollback failed");
            }
        }
    }
}
