//! A durable, deduplicated FIFO queue backing one pipeline stage (§4.1).
//!
//! Work items are persisted to `state_path` as a JSON array in queue order.
//! `add_work` dedups against a `task_key` before enqueueing and persisting;
//! `start` replays the persisted order into an in-memory queue and spawns a
//! single worker loop; `stop` signals the worker to return at the next safe
//! point. A task is considered "in the queue" — and therefore ineligible
//! for a duplicate `add_work` — from the moment it is added until
//! [`StageWorker::process_item`] returns, whether it currently lives on
//! disk, in the in-memory deque, or is mid-processing. Processing failures
//! are logged and swallowed: the item is removed from the queue regardless
//! of outcome (§4.1 "Contract").

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::QueueResult;

/// A task carried by a [`QueueProcessor`]. `task_key` must be stable for a
/// given logical unit of work so re-adding it while it's already queued or
/// in flight is a no-op.
pub trait QueueTask: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn task_key(&self) -> String;
}

/// Executes one task to completion. Implemented by each stage (download,
/// video, upload); failures should be logged with stage-specific context by
/// the implementation — the queue itself only logs that *a* failure
/// occurred, not why.
#[async_trait]
pub trait StageWorker<T: QueueTask>: Send + Sync {
    async fn process_item(&self, item: T) -> anyhow::Result<()>;
}

struct Inner<T> {
    state_path: PathBuf,
    items: Mutex<VecDeque<T>>,
    queued_keys: Mutex<HashSet<String>>,
    has_item: Notify,
    shutdown: Notify,
    shutting_down: std::sync::atomic::AtomicBool,
}

/// A durable queue for one stage. Construct one per stage per process;
/// `state_path` should be unique to that stage (e.g.
/// `<storage>/download_queue_state.json`).
pub struct QueueProcessor<T: QueueTask> {
    inner: Arc<Inner<T>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: QueueTask> QueueProcessor<T> {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state_path: state_path.into(),
                items: Mutex::new(VecDeque::new()),
                queued_keys: Mutex::new(HashSet::new()),
                has_item: Notify::new(),
                shutdown: Notify::new(),
                shutting_down: std::sync::atomic::AtomicBool::new(false),
            }),
            worker_handle: Mutex::new(None),
        }
    }

    /// Load any persisted items (in file order) and spawn the worker loop.
    pub async fn start(&self, worker: Arc<dyn StageWorker<T>>) -> QueueResult<()> {
        self.load_state().await?;

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { Self::run(inner, worker).await });
        *self.worker_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Signal shutdown and wait for the worker loop to exit.
    pub async fn stop(&self) {
        self.inner
            .shutting_down
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.inner.shutdown.notify_waiters();

        if let Some(handle) = self.worker_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Enqueue a task if it isn't already queued or in flight, persisting
    /// the queue before returning.
    pub async fn add_work(&self, item: T) -> QueueResult<()> {
        let key = item.task_key();
        let mut queued_keys = self.inner.queued_keys.lock().await;
        if !queued_keys.insert(key.clone()) {
            debug!(task_key = %key, "item already queued, skipping");
            return Ok(());
        }
        drop(queued_keys);

        self.inner.items.lock().await.push_back(item);
        self.save_state().await?;
        self.inner.has_item.notify_one();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn run(inner: Arc<Inner<T>>, worker: Arc<dyn StageWorker<T>>) {
        loop {
            tokio::select! {
                biased;
                _ = inner.shutdown.notified() => {
                    break;
                }
                _ = inner.has_item.notified() => {}
            }

            if inner.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
                break;
            }

            // A single notification only guarantees "at least one item is
            // present", not "exactly one" — `Notify::notify_one` collapses
            // any number of pending wakeups into a single permit (restart
            // replay in `load_state` and an Auditor sweep both enqueue
            // several items behind one notification). Drain the deque
            // fully before waiting on the next wakeup.
            loop {
                if inner.shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }

                let item = { inner.items.lock().await.pop_front() };
                let Some(item) = item else {
                    break;
                };

                // Persist the pop immediately: once a task is handed to the
                // worker it's either executing or it's dropped (§4.1 —
                // failures are logged and swallowed, never redelivered by
                // the queue itself), so the on-disk file must stop listing
                // it right away. Otherwise a crash-free restart would
                // reload and reprocess whatever the previous run had
                // already finished.
                if let Err(e) = Self::save_state_locked(&inner).await {
                    error!(error = %e, "failed to persist queue state after pop");
                }

                let key = item.task_key();
                if let Err(e) = worker.process_item(item).await {
                    error!(task_key = %key, error = %e, "processing failed, dropping task");
                }
                inner.queued_keys.lock().await.remove(&key);
            }
        }
    }

    /// Drain and reserialize the in-memory queue. The persisted file is
    /// always a superset of (or equal to) the in-memory contents, never a
    /// subset — an item is dropped from the file the moment it's popped for
    /// processing, not when processing completes.
    async fn save_state(&self) -> QueueResult<()> {
        Self::save_state_locked(&self.inner).await
    }

    async fn save_state_locked(inner: &Inner<T>) -> QueueResult<()> {
        let items = inner.items.lock().await;
        let snapshot: Vec<&T> = items.iter().collect();
        if let Some(parent) = inner.state_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(&inner.state_path, json).await?;
        info!(path = %inner.state_path.display(), count = snapshot.len(), "queue state saved");
        Ok(())
    }

    async fn load_state(&self) -> QueueResult<()> {
        let bytes = match tokio::fs::read(&self.inner.state_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Ok(());
        }
        let restored: Vec<T> = serde_json::from_slice(&bytes)?;

        let mut items = self.inner.items.lock().await;
        let mut keys = self.inner.queued_keys.lock().await;
        for item in restored {
            let key = item.task_key();
            if keys.insert(key) {
                items.push_back(item);
            }
        }
        if !items.is_empty() {
            self.inner.has_item.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    struct Item(String);

    impl QueueTask for Item {
        fn task_key(&self) -> String {
            format!("item:{}", self.0)
        }
    }

    struct CountingWorker {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StageWorker<Item> for CountingWorker {
        async fn process_item(&self, _item: Item) -> anyhow::Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn add_work_dedups_by_task_key() {
        let dir = tempdir().unwrap();
        let queue: QueueProcessor<Item> = QueueProcessor::new(dir.path().join("q.json"));

        queue.add_work(Item("x".into())).await.unwrap();
        queue.add_work(Item("x".into())).await.unwrap();
        queue.add_work(Item("y".into())).await.unwrap();

        assert_eq!(queue.len().await, 2);

        let on_disk: Vec<Item> =
            serde_json::from_slice(&tokio::fs::read(dir.path().join("q.json")).await.unwrap())
                .unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[tokio::test]
    async fn start_processes_enqueued_items() {
        let dir = tempdir().unwrap();
        let queue: QueueProcessor<Item> = QueueProcessor::new(dir.path().join("q.json"));
        let count = Arc::new(AtomicUsize::new(0));
        let worker = Arc::new(CountingWorker {
            count: count.clone(),
        });

        queue.add_work(Item("a".into())).await.unwrap();
        queue.add_work(Item("b".into())).await.unwrap();
        queue.start(worker).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        queue.stop().await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn restart_replays_persisted_state_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.json");

        let queue: QueueProcessor<Item> = QueueProcessor::new(&path);
        queue.add_work(Item("a".into())).await.unwrap();
        queue.add_work(Item("b".into())).await.unwrap();
        drop(queue);

        let queue2: QueueProcessor<Item> = QueueProcessor::new(&path);
        let count = Arc::new(AtomicUsize::new(0));
        let worker = Arc::new(CountingWorker {
            count: count.clone(),
        });
        queue2.start(worker).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        queue2.stop().await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completed_items_do_not_survive_a_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.json");

        let queue: QueueProcessor<Item> = QueueProcessor::new(&path);
        let count = Arc::new(AtomicUsize::new(0));
        let worker = Arc::new(CountingWorker {
            count: count.clone(),
        });
        queue.add_work(Item("a".into())).await.unwrap();
        queue.start(worker).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        queue.stop().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The item finished processing in the previous run — it must not
        // still be listed on disk, or a restart would redeliver it.
        let on_disk: Vec<Item> =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert!(on_disk.is_empty());
        drop(queue);

        let queue2: QueueProcessor<Item> = QueueProcessor::new(&path);
        let count2 = Arc::new(AtomicUsize::new(0));
        let worker2 = Arc::new(CountingWorker {
            count: count2.clone(),
        });
        queue2.start(worker2).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        queue2.stop().await;

        assert_eq!(count2.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn a_failed_item_is_still_removed_from_the_queue() {
        struct FailingWorker;
        #[async_trait]
        impl StageWorker<Item> for FailingWorker {
            async fn process_item(&self, _item: Item) -> anyhow::Result<()> {
                anyhow::bail!("boom")
            }
        }

        let dir = tempdir().unwrap();
        let queue: QueueProcessor<Item> = QueueProcessor::new(dir.path().join("q.json"));
        queue.add_work(Item("a".into())).await.unwrap();
        queue.start(Arc::new(FailingWorker)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        queue.stop().await;

        assert!(queue.is_empty().await);
        queue.add_work(Item("a".into())).await.unwrap();
        assert_eq!(queue.len().await, 1);
    }
}
