use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry of transfer names currently owned by a session.
///
/// Keys are final paths as produced by
/// [`StagingPaths::prepare`](crate::StagingPaths::prepare), so names that
/// resolve to the same file share one key. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct NameLocks {
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `key`, or returns `None` if another session holds it.
    ///
    /// The lock is released when the returned guard is dropped.
    pub fn try_acquire(&self, key: &Path) -> Option<NameGuard> {
        let mut held = lock(&self.held);
        if !held.insert(key.to_path_buf()) {
            return None;
        }
        Some(NameGuard {
            key: key.to_path_buf(),
            held: Arc::clone(&self.held),
        })
    }

    /// Number of names currently locked.
    pub fn held_count(&self) -> usize {
        lock(&self.held).len()
    }
}

/// Ownership of one transfer name; releases the lock on drop.
#[derive(Debug)]
pub struct NameGuard {
    key: PathBuf,
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        lock(&self.held).remove(&self.key);
    }
}

// The set stays consistent even if a holder panicked mid-operation.
fn lock(held: &Mutex<HashSet<PathBuf>>) -> MutexGuard<'_, HashSet<PathBuf>> {
    held.lock().unwrap_or_else(|e| e.into_inner())
}
