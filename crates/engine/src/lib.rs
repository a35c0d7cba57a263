//! Storage engine for juntdb
//!
//! This crate turns the core value model into a self-evolving SQLite table:
//! - Store: open/close, the write lane, and per-call sessions
//! - TypeRegistry: kind-to-storage associations and value codecs
//! - SchemaManager: column discovery and on-the-fly `ADD COLUMN`
//! - Session: record writes (upsert, delete, compact, reset) and queries
//! - StoreConfig / RetryConfig: `juntdb.toml` and commit retry policy
//!
//! The engine is the only component that talks to SQLite.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod query;
pub mod registry;
pub mod schema;
pub mod session;
mod store;

pub use database::{
    JournalMode, RetryConfig, Store, StoreBuilder, StoreConfig, CONFIG_FILE_NAME, DEFAULT_TABLE,
    TYPE_ASSOC_TABLE,
};
pub use query::{Columns, Filter, Row, Selection};
pub use registry::{TypeRegistry, BUILTIN_ASSOCIATIONS};
pub use schema::{Column, ColumnAddition, SchemaManager};
pub use session::Session;
