//! Advisory file locks.
//!
//! Used for the encrypted store root and for shared generators. Locks are
//! taken on a fresh file handle, so they exclude other threads of this
//! process as well as other processes.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::trace;

use crate::error::{Result, StoreError};

/// Exclusive lock held until dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock at `path` is acquired, creating the file if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_err = |source| StoreError::Lock {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(lock_err)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_err)?;

        file.lock_exclusive().map_err(lock_err)?;
        trace!(path = %path.display(), "lock acquired");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // The file stays: removing it would let a waiter lock an unlinked inode.
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.path.display(), "lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_across_threads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("locks/root.lock");
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                let path = path.clone();
                scope.spawn(move || {
                    let _lock = FileLock::acquire(&path).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(path.exists());
    }
}
