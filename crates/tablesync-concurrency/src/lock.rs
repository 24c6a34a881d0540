//! Process-wide run exclusion: "Failure to acquire is not an
//! error — the engine exits cleanly, assuming another instance is active."

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::error::ConcurrencyError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A held lock; dropping it releases the lock, including on panic unwind.
pub trait LockGuard: Send {}

/// Acquires a named, process-wide exclusive lock with a bounded wait.
pub trait Lock: Send + Sync {
    /// Returns `Ok(None)` if the wait elapsed without acquiring the lock
    /// — this is not an error condition, just "someone else
    /// is running."
    fn try_acquire(&self, max_wait: Duration) -> Result<Option<Box<dyn LockGuard>>, ConcurrencyError>;
}

struct FileLockGuard {
    #[allow(dead_code)]
    file: File,
}

impl LockGuard for FileLockGuard {}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// A `Lock` backed by an OS advisory file lock, so two OS processes
/// sharing the same lock file path exclude each other.
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Lock for FileLock {
    fn try_acquire(&self, max_wait: Duration) -> Result<Option<Box<dyn LockGuard>>, ConcurrencyError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)?;

        let deadline = Instant::now() + max_wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Some(Box::new(FileLockGuard { file }))),
                Err(_) if Instant::now() >= deadline => return Ok(None),
                Err(_) => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

struct InMemoryLockGuard;
impl LockGuard for InMemoryLockGuard {}

/// An in-process fake for tests: a single `Mutex<bool>` standing in for
/// the OS lock, so tests can exercise "another run is active" without
/// touching the filesystem.
#[derive(Default)]
pub struct InMemoryLock {
    held: Mutex<bool>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lock for InMemoryLock {
    fn try_acquire(&self, max_wait: Duration) -> Result<Option<Box<dyn LockGuard>>, ConcurrencyError> {
        let deadline = Instant::now() + max_wait;
        loop {
            {
                let mut held = self.held.lock();
                if !*held {
                    *held = true;
                    return Ok(Some(Box::new(InMemoryLockGuard)));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_lock_excludes_a_second_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        let lock_a = FileLock::new(&path);
        let lock_b = FileLock::new(&path);

        let guard = lock_a.try_acquire(Duration::from_millis(200)).unwrap();
        assert!(guard.is_some());

        let second = lock_b.try_acquire(Duration::from_millis(200)).unwrap();
        assert!(second.is_none());

        drop(guard);
        let third = lock_b.try_acquire(Duration::from_secs(1)).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn in_memory_lock_excludes_concurrent_holders() {
        let lock = InMemoryLock::new();
        let first = lock.try_acquire(Duration::from_millis(50)).unwrap();
        assert!(first.is_some());
        let second = lock.try_acquire(Duration::from_millis(50)).unwrap();
        assert!(second.is_none());
    }
}
