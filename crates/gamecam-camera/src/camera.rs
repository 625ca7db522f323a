//! The `Camera` collaborator contract (§6). The core consumes this; it does
//! not implement vendor protocols beyond the one bundled reference
//! implementation ([`crate::dahua::DahuaCamera`]).

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CameraResult;

/// One entry from the camera's recording index.
#[derive(Debug, Clone)]
pub struct RemoteRecording {
    pub remote_path: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub size: u64,
}

/// Narrow async contract a camera vendor integration must provide. Single-
/// owner: the Poller and the Download Processor must not overlap camera
/// sessions (§5).
#[async_trait]
pub trait Camera: Send + Sync {
    /// Cheap reachability check, polled once per tick.
    async fn check_availability(&self) -> bool;

    /// List recordings ending strictly after `since` and no later than
    /// `until`.
    async fn list_recordings(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CameraResult<Vec<RemoteRecording>>;

    /// Stream `remote_path` to `local_path`, creating parent directories as
    /// needed. Returns the number of bytes written.
    async fn download_file(&self, remote_path: &str, local_path: &Path) -> CameraResult<u64>;
}
