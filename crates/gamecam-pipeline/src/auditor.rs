//! State Auditor (§4.6): periodically scans every group directory and
//! re-injects work based on persisted `state.json` truth. This is the sole
//! recovery path on restart and the only authority that converts on-disk
//! state back into queue work — per-stage workers never re-enqueue
//! themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use gamecam_models::{
    CombineTask, ConvertTask, DownloadQueueTask, DownloadTask, FileStatus, GroupStatus, MatchInfo,
    TrimTask, UploadQueueTask, VideoTask, YoutubeUploadTask,
};
use gamecam_queue::QueueProcessor;
use gamecam_state::DirectoryState;

/// Reconciles persisted per-group state against the three inner queues on a
/// fixed interval (§4.6).
pub struct StateAuditor {
    storage_root: PathBuf,
    download_queue: Arc<QueueProcessor<DownloadQueueTask>>,
    video_queue: Arc<QueueProcessor<VideoTask>>,
    upload_queue: Arc<QueueProcessor<UploadQueueTask>>,
    interval: Duration,
}

impl StateAuditor {
    pub fn new(
        storage_root: PathBuf,
        download_queue: Arc<QueueProcessor<DownloadQueueTask>>,
        video_queue: Arc<QueueProcessor<VideoTask>>,
        upload_queue: Arc<QueueProcessor<UploadQueueTask>>,
        interval: Duration,
    ) -> Self {
        Self {
            storage_root,
            download_queue,
            video_queue,
            upload_queue,
            interval,
        }
    }

    /// Run the audit loop until `shutdown` fires.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = self.sweep() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// One full pass over every group directory under the storage root.
    pub async fn sweep(&self) {
        let mut entries = match tokio::fs::read_dir(&self.storage_root).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, path = %self.storage_root.display(), "auditor failed to list storage root");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if gamecam_models::parse_group_dir_name(
                path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            )
            .is_none()
            {
                continue;
            }
            self.audit_group(&path).await;
        }
    }

    async fn audit_group(&self, group_dir: &Path) {
        let state = DirectoryState::new(group_dir);
        let doc = match state.read().await {
            Ok(d) => d,
            Err(e) => {
                warn!(group = %group_dir.display(), error = %e, "auditor failed to read state.json");
                return;
            }
        };

        for (local_path, record) in &doc.files {
            if !record.is_active() {
                continue;
            }
            match record.status {
                FileStatus::Downloaded => {
                    if !local_path.with_extension("mp4").exists() {
                        self.emit_convert(local_path).await;
                    }
                }
                FileStatus::Downloading => {
                    // No fresh writer survives a restart in this process
                    // model (§4.3 "Cancellation") — any file parked here
                    // was interrupted mid-write and needs re-download.
                    self.emit_download(group_dir, local_path).await;
                }
                _ => {}
            }
        }

        if doc.status != GroupStatus::Combined
            && doc.status != GroupStatus::Trimmed
            && doc.status != GroupStatus::AutocamComplete
            && doc.status != GroupStatus::YoutubeUploaded
            && DirectoryState::all_active_files_at_least(&doc, FileStatus::Converted)
        {
            self.emit_combine(group_dir).await;
        }

        if doc.status == GroupStatus::Combined {
            self.maybe_emit_trim(group_dir).await;
        }

        if doc.status == GroupStatus::Trimmed {
            self.emit_upload(group_dir).await;
        }
    }

    async fn emit_convert(&self, local_path: &Path) {
        debug!(path = %local_path.display(), "auditor re-emitting convert");
        if let Err(e) = self
            .video_queue
            .add_work(VideoTask::Convert(ConvertTask {
                file_path: local_path.to_path_buf(),
            }))
            .await
        {
            warn!(error = %e, "auditor failed to enqueue convert");
        }
    }

    async fn emit_download(&self, group_dir: &Path, local_path: &Path) {
        debug!(path = %local_path.display(), "auditor re-emitting download");
        let remote_path = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if let Err(e) = self
            .download_queue
            .add_work(DownloadQueueTask::DahuaDownload(DownloadTask {
                remote_path,
                local_path: local_path.to_path_buf(),
            }))
            .await
        {
            warn!(error = %e, group = %group_dir.display(), "auditor failed to enqueue download");
        }
    }

    async fn emit_combine(&self, group_dir: &Path) {
        debug!(group = %group_dir.display(), "auditor re-emitting combine");
        if let Err(e) = self
            .video_queue
            .add_work(VideoTask::Combine(CombineTask {
                group_dir: group_dir.to_path_buf(),
            }))
            .await
        {
            warn!(error = %e, group = %group_dir.display(), "auditor failed to enqueue combine");
        }
    }

    async fn maybe_emit_trim(&self, group_dir: &Path) {
        let match_info = match MatchInfo::load(group_dir.join("match_info.ini")) {
            Ok(m) => m,
            Err(e) => {
                warn!(group = %group_dir.display(), error = %e, "auditor failed to read match_info.ini");
                return;
            }
        };
        let Ok(Some((start, end))) = match_info.trim_window_secs() else {
            return;
        };

        if let Some(output_path) = match_info.trim_output_path(group_dir) {
            if gamecam_media::trim_output_is_valid(&output_path, start, end).await {
                return;
            }
        }

        debug!(group = %group_dir.display(), "auditor re-emitting trim");
        if let Err(e) = self
            .video_queue
            .add_work(VideoTask::Trim(TrimTask {
                group_dir: group_dir.to_path_buf(),
                start_offset_secs: start,
                end_offset_secs: end,
            }))
            .await
        {
            warn!(error = %e, group = %group_dir.display(), "auditor failed to enqueue trim");
        }
    }

    async fn emit_upload(&self, group_dir: &Path) {
        debug!(group = %group_dir.display(), "auditor re-emitting upload");
        if let Err(e) = self
            .upload_queue
            .add_work(UploadQueueTask::YoutubeUpload(YoutubeUploadTask {
                group_dir: group_dir.to_path_buf(),
            }))
            .await
        {
            warn!(error = %e, group = %group_dir.display(), "auditor failed to enqueue upload");
        }
    }
}
