//! Cross-process file lock: `open(O_CREAT|O_EXCL)` on a `<path>.lock`
//! sentinel, retried with delay up to a timeout, removed on release. This is
//! the companion to the in-process per-group lock in [`crate::directory_state`]
//! — it's what keeps two processes on the same host from racing on the same
//! group's `state.json`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::fs::OpenOptions;

use crate::error::{StateError, StateResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Held for the lifetime of the guard; dropping it removes the lock file.
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire the lock on `path` (a `.lock` suffix is appended), waiting up
    /// to `timeout` and retrying every `retry_delay`.
    pub async fn acquire_with(
        path: impl AsRef<Path>,
        timeout: Duration,
        retry_delay: Duration,
    ) -> StateResult<Self> {
        let lock_path = append_lock_suffix(path.as_ref());
        let start = Instant::now();

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_file) => return Ok(Self { lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        return Err(StateError::LockTimeout(lock_path));
                    }
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => return Err(StateError::Io(e)),
            }
        }
    }

    pub async fn acquire(path: impl AsRef<Path>) -> StateResult<Self> {
        Self::acquire_with(path, DEFAULT_TIMEOUT, DEFAULT_RETRY_DELAY).await
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

fn append_lock_suffix(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".lock");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn acquire_then_release_allows_reacquire() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("state.json");

        let lock = FileLock::acquire(&target).await.unwrap();
        assert!(append_lock_suffix(&target).exists());
        drop(lock);
        assert!(!append_lock_suffix(&target).exists());

        let lock2 = FileLock::acquire(&target).await.unwrap();
        drop(lock2);
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("state.json");

        let _held = FileLock::acquire(&target).await.unwrap();
        let result = FileLock::acquire_with(
            &target,
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(StateError::LockTimeout(_))));
    }
}
