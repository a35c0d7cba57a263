//! Store configuration via `juntdb.toml`
//!
//! The config file is optional: `Store::open` uses defaults, and callers that
//! want a file load it with [`StoreConfig::from_file`] and pass it to
//! `Store::open_with_config`.

use super::transactions::RetryConfig;
use juntdb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default name of the primary table
pub const DEFAULT_TABLE: &str = "joblist";

/// Name of the persisted type-association table
pub const TYPE_ASSOC_TABLE: &str = "type_assoc";

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "juntdb.toml";

/// SQLite journal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Write-ahead log: readers never block on the writer
    #[default]
    Wal,
    /// Rollback journal
    Delete,
}

impl JournalMode {
    /// Pragma value
    pub fn pragma_value(&self) -> &'static str {
        match self {
            JournalMode::Wal => "wal",
            JournalMode::Delete => "delete",
        }
    }
}

/// Store configuration
///
/// # Example
///
/// ```toml
/// table = "joblist"
/// journal_mode = "wal"
/// busy_timeout_ms = 5000
/// max_identity_attempts = 64
///
/// [retry]
/// max_retries = 3
/// base_delay_ms = 10
/// max_delay_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Primary table name
    pub table: String,
    /// SQLite journal mode
    pub journal_mode: JournalMode,
    /// How long one lock wait may block before it counts as a transient failure
    pub busy_timeout_ms: u64,
    /// Insert attempts allowed when identities collide
    pub max_identity_attempts: usize,
    /// Commit retry policy
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            journal_mode: JournalMode::default(),
            busy_timeout_ms: 5000,
            max_identity_attempts: 64,
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Set the primary table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the commit retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the busy timeout
    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Set the collision attempt bound
    pub fn with_max_identity_attempts(mut self, attempts: usize) -> Self {
        self.max_identity_attempts = attempts;
        self
    }

    /// Check values that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(Error::config("table name must not be empty"));
        }
        if self.table.eq_ignore_ascii_case(TYPE_ASSOC_TABLE) {
            return Err(Error::config(format!(
                "table name '{}' is reserved",
                TYPE_ASSOC_TABLE
            )));
        }
        if self.max_identity_attempts == 0 {
            return Err(Error::config("max_identity_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# juntdb store configuration

# Primary table holding every record
table = "joblist"

# SQLite journal mode: "wal" (default) or "delete"
#   "wal"    = readers run alongside the writer
#   "delete" = classic rollback journal
journal_mode = "wal"

# Milliseconds a lock wait may block before it counts as a transient failure
busy_timeout_ms = 5000

# Insert attempts allowed when generated identities collide
max_identity_attempts = 64

# Commit retry policy for transient lock contention
[retry]
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
