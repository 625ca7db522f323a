//! Per-group `state.json`: group status, per-file records, and the
//! playlist-name slot (§3). All reads/writes serialize behind an in-process
//! lock per group directory, and a [`FileLock`] wraps every write (and every
//! read that must be consistent with a subsequent write) for cross-process
//! safety on the same host (§5).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use gamecam_models::{FileRecord, FileStatus, GroupStatus};

use crate::error::StateResult;
use crate::lock::FileLock;

/// Document persisted at `<group_dir>/state.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub status: GroupStatus,
    #[serde(default)]
    pub files: BTreeMap<PathBuf, FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_playlist_name: Option<String>,
}

/// Per-group handle. Cheap to construct; the in-process lock it uses is
/// keyed by `group_dir` and shared process-wide.
pub struct DirectoryState {
    group_dir: PathBuf,
}

fn in_process_locks() -> &'static StdMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> = OnceLock::new();
    LOCKS.get_or_init(|| StdMutex::new(HashMap::new()))
}

fn in_process_lock_for(group_dir: &Path) -> Arc<AsyncMutex<()>> {
    let mut locks = in_process_locks().lock().expect("locks mutex poisoned");
    locks
        .entry(group_dir.to_path_buf())
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

impl DirectoryState {
    pub fn new(group_dir: impl Into<PathBuf>) -> Self {
        Self {
            group_dir: group_dir.into(),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.group_dir.join("state.json")
    }

    /// Read the current document without acquiring the cross-process lock.
    /// Safe for read-only inspection (e.g. the Auditor's scan); callers that
    /// will write back based on what they read should use [`Self::mutate`]
    /// instead.
    pub async fn read(&self) -> StateResult<StateDocument> {
        Self::load(&self.state_path()).await
    }

    async fn load(path: &Path) -> StateResult<StateDocument> {
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(StateDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &StateDocument) -> StateResult<()> {
        tokio::fs::create_dir_all(&self.group_dir).await?;
        let json = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(self.state_path(), json).await?;
        Ok(())
    }

    /// Read-modify-write under both the in-process lock (serializes workers
    /// inside this process) and the cross-process file lock (serializes
    /// against other processes on the same host).
    pub async fn mutate<F>(&self, f: F) -> StateResult<StateDocument>
    where
        F: FnOnce(&mut StateDocument),
    {
        let in_process = in_process_lock_for(&self.group_dir);
        let _in_process_guard = in_process.lock().await;
        let _file_guard = FileLock::acquire(self.state_path()).await?;

        let mut doc = Self::load(&self.state_path()).await?;
        f(&mut doc);
        self.write(&doc).await?;
        Ok(doc)
    }

    /// Update (or insert) one file's record.
    pub async fn update_file_state(
        &self,
        local_path: &Path,
        status: FileStatus,
    ) -> StateResult<StateDocument> {
        let local_path = local_path.to_path_buf();
        self.mutate(|doc| {
            doc.files
                .entry(local_path)
                .and_modify(|r| r.status = status)
                .or_insert_with(|| FileRecord::new(status));
        })
        .await
    }

    pub async fn mark_file_failed(
        &self,
        local_path: &Path,
        status: FileStatus,
        error: impl Into<String>,
    ) -> StateResult<StateDocument> {
        let local_path = local_path.to_path_buf();
        let error = error.into();
        self.mutate(|doc| {
            let record = doc
                .files
                .entry(local_path)
                .or_insert_with(|| FileRecord::new(status));
            record.status = status;
            record.last_error = Some(error);
        })
        .await
    }

    pub async fn set_skip(&self, local_path: &Path, skip: bool) -> StateResult<StateDocument> {
        let local_path = local_path.to_path_buf();
        self.mutate(|doc| {
            if let Some(record) = doc.files.get_mut(&local_path) {
                record.skip = skip;
            }
        })
        .await
    }

    pub async fn set_group_status(&self, status: GroupStatus) -> StateResult<StateDocument> {
        self.mutate(|doc| doc.status = status).await
    }

    pub async fn set_playlist_name(&self, name: impl Into<String>) -> StateResult<StateDocument> {
        let name = name.into();
        self.mutate(|doc| doc.youtube_playlist_name = Some(name))
            .await
    }

    /// Are all non-skipped files in the given status (or past it in the
    /// lattice, for `converted`/`combined`)?
    pub fn all_active_files_at_least(doc: &StateDocument, status: FileStatus) -> bool {
        let active: Vec<_> = doc.files.values().filter(|r| r.is_active()).collect();
        if active.is_empty() {
            return false;
        }
        active.iter().all(|r| match status {
            FileStatus::Converted => {
                matches!(r.status, FileStatus::Converted | FileStatus::Combined)
            }
            other => r.status == other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_file_and_group_status() {
        let dir = tempdir().unwrap();
        let state = DirectoryState::new(dir.path());

        state
            .update_file_state(Path::new("/g/a.dav"), FileStatus::Downloading)
            .await
            .unwrap();
        let doc = state
            .update_file_state(Path::new("/g/a.dav"), FileStatus::Downloaded)
            .await
            .unwrap();
        assert_eq!(
            doc.files[Path::new("/g/a.dav")].status,
            FileStatus::Downloaded
        );

        let doc = state.set_group_status(GroupStatus::Combined).await.unwrap();
        assert_eq!(doc.status, GroupStatus::Combined);
    }

    #[tokio::test]
    async fn skip_excludes_file_from_all_active_check() {
        let dir = tempdir().unwrap();
        let state = DirectoryState::new(dir.path());

        state
            .update_file_state(Path::new("/g/a.dav"), FileStatus::Converted)
            .await
            .unwrap();
        state
            .update_file_state(Path::new("/g/b.dav"), FileStatus::Downloaded)
            .await
            .unwrap();
        let doc = state.set_skip(Path::new("/g/b.dav"), true).await.unwrap();

        assert!(DirectoryState::all_active_files_at_least(
            &doc,
            FileStatus::Converted
        ));
    }

    #[tokio::test]
    async fn missing_state_file_reads_as_default() {
        let dir = tempdir().unwrap();
        let state = DirectoryState::new(dir.path());
        let doc = state.read().await.unwrap();
        assert_eq!(doc.status, GroupStatus::Pending);
        assert!(doc.files.is_empty());
    }
}
