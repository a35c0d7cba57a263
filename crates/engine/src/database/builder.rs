//! Store builder for fluent configuration
//!
//! ```no_run
//! use juntdb_core::SemanticKind;
//! use juntdb_engine::{RetryConfig, Store, StoreConfig, TypeRegistry};
//!
//! let registry = TypeRegistry::builtin().with(SemanticKind::Bytes, "BLOB")?;
//! let store = Store::builder()
//!     .config(StoreConfig::default().with_retry(RetryConfig::no_retry()))
//!     .registry(registry)
//!     .open("/data/jobs.db")?;
//! # Ok::<(), juntdb_core::Error>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use juntdb_core::{Clock, IdentityGenerator, Result};

use super::config::StoreConfig;
use super::Store;
use crate::registry::TypeRegistry;

/// Builder for [`Store`]
///
/// Defaults: [`StoreConfig::default`], the built-in type registry and the
/// local system clock.
#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    registry: TypeRegistry,
    generator: IdentityGenerator,
}

impl StoreBuilder {
    /// Create new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Type values with `registry`
    ///
    /// Associations already persisted in the file take precedence.
    pub fn registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Generate identities from `clock`
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.generator = IdentityGenerator::with_clock(clock);
        self
    }

    /// Open the store file at `path`, creating it if missing
    ///
    /// If the file is already open in this process, the existing store is
    /// returned and the builder's settings are ignored.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Arc<Store>> {
        Store::open_with_parts(path.as_ref(), self.config, self.registry, self.generator)
    }
}
