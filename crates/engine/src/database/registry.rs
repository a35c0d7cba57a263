//! Process-wide registry of open stores
//!
//! Opening the same file twice returns the same [`Store`], so every caller
//! in the process shares one write lane per file. Entries are weak and
//! disappear once the last handle is dropped.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Weak;

use super::Store;

// parking_lot::Mutex: no poisoning if a thread panics while opening a store.

/// Open stores by canonical file path
pub static OPEN_STORES: Lazy<Mutex<HashMap<PathBuf, Weak<Store>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
