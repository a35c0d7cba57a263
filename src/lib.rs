//! juntdb - Self-evolving single-table record store
//!
//! juntdb stores arbitrary semantically-typed records in one SQLite table.
//! A field seen for the first time gets its own column, typed from the
//! value's kind, and every row is keyed by a 17-digit millisecond timestamp.
//!
//! # Quick Start
//!
//! ```no_run
//! use juntdb::{Columns, Filter, Record, Store};
//!
//! let store = Store::open("jobs.db")?;
//!
//! let mut record = Record::new()
//!     .with("date", "20240101120000000")
//!     .with("score", 7);
//! let id = store.write(&mut record, true)?;
//!
//! let recent = store.last_n(10, &Columns::only(["score"]))?;
//! let matches = store.match_identities(&Filter::new().any_of("score", [7]))?;
//! assert_eq!(matches, vec![id]);
//! # Ok::<(), juntdb::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `juntdb-core`: values, tensors, identities, records, errors
//! - `juntdb-engine`: type registry, schema evolution, store and queries

pub use juntdb_core::*;
pub use juntdb_engine::*;
