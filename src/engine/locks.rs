//! Per-version directory locks.
//!
//! A save rewrites label files, split directories and the manifest of one
//! version directory. Writers of the same directory are serialized through
//! a mutex keyed by the directory path; different versions proceed in
//! parallel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct VersionLocks {
    inner: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl VersionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `dir`. Lock it with `.lock()` and hold the guard for
    /// the whole write sequence.
    pub fn handle(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock();
        // Drop entries nobody holds any more.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Handles for several directories, sorted by path so that callers
    /// taking more than one always lock in the same order.
    pub fn handles<'a, I>(&self, dirs: I) -> Vec<Arc<Mutex<()>>>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut dirs: Vec<&Path> = dirs.into_iter().collect();
        dirs.sort();
        dirs.dedup();
        dirs.into_iter().map(|dir| self.handle(dir)).collect()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().len()
    }
}
