//! Shared test utilities for the engine integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use chrono::{NaiveDate, NaiveDateTime};
pub use juntdb_core::{
    CallableRef, Error, FixedClock, Identity, IdentityGenerator, Record, SemanticKind, Tensor,
    Value,
};
pub use juntdb_engine::{
    Columns, Filter, RetryConfig, Row, Selection, Store, StoreConfig, TypeRegistry,
};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

/// Route engine logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ============================================================================
// TestStore - on-disk store in a temp directory
// ============================================================================

/// Store file inside a temp directory that lives as long as the wrapper.
pub struct TestStore {
    pub store: Arc<Store>,
    pub dir: TempDir,
}

impl TestStore {
    /// Fresh store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Fresh store with an explicit configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let store = Store::open_with_config(dir.path().join("jobs.db"), config).expect("open store");
        TestStore { store, dir }
    }

    /// Fresh store whose identities come from a frozen clock.
    pub fn with_clock(at: NaiveDateTime, config: StoreConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let store = Store::builder()
            .config(config)
            .clock(Arc::new(FixedClock(at)))
            .open(dir.path().join("jobs.db"))
            .expect("open store");
        TestStore { store, dir }
    }

    /// Store file path.
    pub fn path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    /// Drop the store handle and open the same file again.
    pub fn reopen(self) -> Self {
        let path = self.path();
        let dir = self.dir;
        drop(self.store);
        let store = Store::open(&path).expect("reopen store");
        TestStore { store, dir }
    }

    /// Insert a record under `identity` with the given fields.
    pub fn insert(&self, identity: Identity, fields: Vec<(&str, Value)>) -> Identity {
        let mut record = Record::with_identity(identity);
        for (name, value) in fields {
            record.set(name, value);
        }
        self.store.write(&mut record, true).expect("insert record")
    }

    /// Names of the table's columns, in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.store
            .columns()
            .expect("columns")
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    /// Raw connection to the store file, bypassing the engine.
    pub fn raw(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(self.path()).expect("raw connection")
    }
}

// ============================================================================
// Identities
// ============================================================================

/// Parse a 17-digit identity.
pub fn id(s: &str) -> Identity {
    Identity::parse(s).expect("valid identity")
}

/// `base` shifted by `ms` milliseconds, as an identity.
pub fn id_plus(base: NaiveDateTime, ms: i64) -> Identity {
    Identity::from_datetime(base + chrono::Duration::milliseconds(ms))
}

/// 2024-01-01 12:00:00.000
pub fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_milli_opt(12, 0, 0, 0))
        .expect("valid date")
}
