//! Connection-scoped sessions
//!
//! A [`Session`] owns one SQLite connection and carries every read and write
//! operation of the store (see `store.rs` and `query.rs`). Dropping it
//! closes the connection; a write transaction still open at that point has
//! already been rolled back by its guard.

use crate::database::config::StoreConfig;
use crate::database::transactions::retry_transient;
use crate::registry::TypeRegistry;
use crate::schema::SchemaManager;
use juntdb_core::{Error, IdentityGenerator, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// State shared by a store and all of its sessions
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) path: PathBuf,
    pub(crate) config: StoreConfig,
    pub(crate) registry: TypeRegistry,
    pub(crate) generator: IdentityGenerator,
}

/// One open connection to a store file
///
/// Not `Sync`: a session shared across threads needs an outer lock, and
/// callers doing so must serialize their own writes.
pub struct Session {
    pub(crate) conn: Connection,
    pub(crate) shared: Arc<Shared>,
}

impl Session {
    pub(crate) fn open(shared: Arc<Shared>) -> Result<Self> {
        let conn = open_connection(&shared.path, &shared.config)?;
        Ok(Session { conn, shared })
    }

    /// Store file path
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Registry this session types values with
    pub fn registry(&self) -> &TypeRegistry {
        &self.shared.registry
    }

    /// Configuration the store was opened with
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub(crate) fn schema(&self) -> SchemaManager<'_> {
        SchemaManager::new(&self.shared.registry, &self.shared.config.table)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.shared.path)
            .field("table", &self.shared.config.table)
            .finish()
    }
}

/// Open a connection with the configured pragmas applied
pub(crate) fn open_connection(path: &Path, config: &StoreConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags).map_err(Error::storage)?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(Error::storage)?;

    let wanted = config.journal_mode.pragma_value();
    let actual: String = retry_transient(&config.retry, "journal_mode", || {
        conn.pragma_update_and_check(None, "journal_mode", wanted, |row| row.get(0))
    })?;
    if !actual.eq_ignore_ascii_case(wanted) {
        warn!(
            target: "juntdb::store",
            path = ?path,
            wanted,
            actual = %actual,
            "journal mode not applied"
        );
    }
    Ok(conn)
}
