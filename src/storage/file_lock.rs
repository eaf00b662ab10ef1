//! Path-keyed write locks
//!
//! Two requests unpacking into the same folder must not write the same file
//! at the same time. Each destination path gets its own mutex, created on
//! first use, so unrelated writes never contend on a single global lock.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::normalize;

/// Lock table keyed by normalized destination path
#[derive(Debug, Default)]
pub struct FileLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutex guarding `path`.
    pub fn get(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = normalize(path);
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the lock for `path`.
    ///
    /// The lock is released when `f` returns, including on error.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.get(path);
        let _guard = lock.lock();
        f()
    }

    /// Number of distinct paths that have been locked so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
