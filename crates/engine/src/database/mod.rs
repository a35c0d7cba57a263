//! Store struct and open logic
//!
//! [`Store`] is the handle callers keep. It owns the configuration, the
//! type registry and the identity generator, and hands out [`Session`]s,
//! each wrapping its own SQLite connection. The convenience methods on
//! `Store` open a session for the duration of one call.
//!
//! ## Concurrency
//!
//! - Writers going through one `Store` (`write`, `delete`, `compact`,
//!   `reset`) are serialized on its write lane
//! - Readers run in parallel with each other and, in WAL mode, with the
//!   writer; they see the last committed state
//! - Writers in other processes are serialized by SQLite's own lock,
//!   waited on for up to `busy_timeout_ms` and then retried per
//!   [`RetryConfig`]

pub mod builder;
pub mod config;
mod registry;
pub(crate) mod transactions;

pub use builder::StoreBuilder;
pub use config::{JournalMode, StoreConfig, CONFIG_FILE_NAME, DEFAULT_TABLE, TYPE_ASSOC_TABLE};
pub use registry::OPEN_STORES;
pub use transactions::RetryConfig;

use crate::query::{Columns, Filter, Row, Selection};
use crate::registry::TypeRegistry;
use crate::schema::{quote_ident, Column};
use crate::session::{open_connection, Session, Shared};
use juntdb_core::{Error, Identity, IdentityGenerator, Record, Result, Value};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use transactions::WriteTxn;

// ============================================================================
// Store Struct
// ============================================================================

/// A self-evolving single-table record store
///
/// # Example
///
/// ```no_run
/// use juntdb_core::{Record, Value};
/// use juntdb_engine::{Columns, Store};
///
/// let store = Store::open("/data/jobs.db")?;
/// let mut record = Record::new()
///     .with("date", "20240101120000000")
///     .with("score", 7);
/// let id = store.write(&mut record, true)?;
///
/// let mut update = Record::with_identity(id).with("viewed", true);
/// store.write(&mut update, false)?;
///
/// let row = store.get_columns(id, &["score", "viewed"])?;
/// assert_eq!(row, vec![Value::Int(7), Value::Bool(true)]);
/// # Ok::<(), juntdb_core::Error>(())
/// ```
pub struct Store {
    /// Configuration, registry and generator shared with every session
    shared: Arc<Shared>,

    /// Exclusive write lane
    ///
    /// parking_lot::Mutex to avoid lock poisoning on panic.
    write_lane: Mutex<()>,
}

impl Store {
    /// Open the store file at `path` with default configuration
    ///
    /// Creates the file and its tables if missing. Opening a file that is
    /// already open in this process returns the same `Arc<Store>`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open the store file at `path` with an explicit configuration
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Arc<Self>> {
        Self::open_with_parts(
            path.as_ref(),
            config,
            TypeRegistry::builtin(),
            IdentityGenerator::new(),
        )
    }

    /// Builder for custom registries and clocks
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn open_with_parts(
        path: &Path,
        config: StoreConfig,
        mut registry: TypeRegistry,
        generator: IdentityGenerator,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let canonical_path = canonicalize_file(path)?;

        // Held across initialization so one thread creates the store per path
        let mut open = OPEN_STORES.lock();
        if let Some(store) = open.get(&canonical_path).and_then(|weak| weak.upgrade()) {
            info!(target: "juntdb::store", path = ?canonical_path, "returning existing store instance");
            return Ok(store);
        }

        let conn = open_connection(&canonical_path, &config)?;
        initialize(&conn, &config, &mut registry)?;
        drop(conn);

        let store = Arc::new(Store {
            shared: Arc::new(Shared {
                path: canonical_path.clone(),
                config,
                registry,
                generator,
            }),
            write_lane: Mutex::new(()),
        });
        open.insert(canonical_path.clone(), Arc::downgrade(&store));

        info!(
            target: "juntdb::store",
            path = ?canonical_path,
            table = %store.shared.config.table,
            journal_mode = store.shared.config.journal_mode.pragma_value(),
            kinds = store.shared.registry.associations().count(),
            "store opened"
        );
        Ok(store)
    }

    /// Open a session on its own connection
    pub fn session(&self) -> Result<Session> {
        Session::open(Arc::clone(&self.shared))
    }

    /// Canonical file path
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Configuration in effect
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Type registry in effect, persisted associations included
    pub fn registry(&self) -> &TypeRegistry {
        &self.shared.registry
    }

    // ========================================================================
    // Writes (serialized on the write lane)
    // ========================================================================

    /// See [`Session::write`]
    pub fn write(&self, record: &mut Record, is_new: bool) -> Result<Identity> {
        let _lane = self.write_lane.lock();
        self.session()?.write(record, is_new)
    }

    /// See [`Session::delete`]
    pub fn delete(&self, identities: &[Identity]) -> Result<usize> {
        let _lane = self.write_lane.lock();
        self.session()?.delete(identities)
    }

    /// See [`Session::compact`]
    pub fn compact(&self) -> Result<()> {
        let _lane = self.write_lane.lock();
        self.session()?.compact()
    }

    /// See [`Session::reset`]
    pub fn reset(&self) -> Result<()> {
        let _lane = self.write_lane.lock();
        self.session()?.reset()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// See [`Session::columns`]
    pub fn columns(&self) -> Result<Vec<Column>> {
        self.session()?.columns()
    }

    /// See [`Session::count`]
    pub fn count(&self) -> Result<u64> {
        self.session()?.count()
    }

    /// See [`Session::get_columns`]
    pub fn get_columns(&self, identity: Identity, columns: &[&str]) -> Result<Vec<Value>> {
        self.session()?.get_columns(identity, columns)
    }

    /// See [`Session::fetch_one`]
    pub fn fetch_one(&self, identity: Identity, column: &str) -> Result<Value> {
        self.session()?.fetch_one(identity, column)
    }

    /// See [`Session::range`]
    pub fn range(&self, lo: Identity, hi: Identity, columns: &Columns) -> Result<Selection> {
        self.session()?.range(lo, hi, columns)
    }

    /// See [`Session::match_rows`]
    pub fn match_rows(&self, filter: &Filter, columns: &Columns) -> Result<Vec<Row>> {
        self.session()?.match_rows(filter, columns)
    }

    /// See [`Session::match_identities`]
    pub fn match_identities(&self, filter: &Filter) -> Result<Vec<Identity>> {
        self.session()?.match_identities(filter)
    }

    /// See [`Session::last_n`]
    pub fn last_n(&self, n: usize, columns: &Columns) -> Result<Vec<Row>> {
        self.session()?.last_n(n, columns)
    }

    /// See [`Session::last_n_maps`]
    pub fn last_n_maps(&self, n: usize, columns: &Columns) -> Result<Vec<Record>> {
        self.session()?.last_n_maps(n, columns)
    }

    /// See [`Session::last_n_identities`]
    pub fn last_n_identities(&self, n: usize) -> Result<Vec<Identity>> {
        self.session()?.last_n_identities(n)
    }

    /// See [`Session::dates_in`]
    pub fn dates_in(&self, a: Identity, b: Identity) -> Result<Vec<Identity>> {
        self.session()?.dates_in(a, b)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.shared.path)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let mut open = OPEN_STORES.lock();
        // A newer instance may already own the entry
        if open
            .get(&self.shared.path)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            open.remove(&self.shared.path);
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Canonical form of a file path whose file may not exist yet
fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid_input(format!("'{}' is not a file path", path.display())))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    Ok(parent.canonicalize()?.join(file_name))
}

/// Create both tables if missing, seed the associations, and adopt what
/// the file already holds
fn initialize(conn: &Connection, config: &StoreConfig, registry: &mut TypeRegistry) -> Result<()> {
    let assoc = quote_ident(TYPE_ASSOC_TABLE);
    let txn = WriteTxn::begin(conn, &config.retry)?;
    crate::schema::SchemaManager::new(registry, &config.table).ensure_table(conn)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (ptype TEXT PRIMARY KEY, stype TEXT)",
        assoc
    ))
    .map_err(Error::storage)?;
    {
        let mut seed = conn
            .prepare(&format!(
                "INSERT OR IGNORE INTO {} (ptype, stype) VALUES (?1, ?2)",
                assoc
            ))
            .map_err(Error::storage)?;
        for (kind, storage_type) in registry.associations() {
            seed.execute([kind.name(), storage_type])
                .map_err(Error::storage)?;
        }
    }
    txn.commit(&config.retry)?;

    let mut stmt = conn
        .prepare(&format!("SELECT ptype, stype FROM {}", assoc))
        .map_err(Error::storage)?;
    let persisted = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(Error::storage)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Error::storage)?;
    registry.adopt(persisted.iter().map(|(k, s)| (k.as_str(), s.as_str())));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_tables() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("jobs.db")).unwrap();
        let columns = store.columns().unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "date");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_same_path_returns_same_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");
        let a = Store::open(&path).unwrap();
        let b = Store::open(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registry_entry_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");
        let store = Store::open(&path).unwrap();
        let key = store.path().to_path_buf();
        drop(store);
        assert!(!OPEN_STORES.lock().contains_key(&key));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::default().with_table("type_assoc");
        assert!(matches!(
            Store::open_with_config(dir.path().join("jobs.db"), config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_directory_path_rejected() {
        assert!(Store::open("/").is_err());
    }

    #[test]
    fn test_associations_seeded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");
        drop(Store::open(&path).unwrap());

        let conn = Connection::open(&path).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM type_assoc", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 9);
        let stype: String = conn
            .query_row(
                "SELECT stype FROM type_assoc WHERE ptype = 'dict'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(stype, "DICT");
    }
}
