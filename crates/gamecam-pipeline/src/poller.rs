//! Camera Poller (§4.2): discovers new recordings on the camera at a fixed
//! interval and emits download tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use gamecam_camera::Camera;
use gamecam_models::{group_recordings, DownloadQueueTask, DownloadTask, RecordingFile};
use gamecam_queue::QueueProcessor;
use gamecam_state::{CameraState, ConnectionEventType};

/// Polls one [`Camera`] collaborator, discovering recordings and enqueueing
/// download tasks. Single-owner over the camera (§5): must not run
/// concurrently with the Download Processor's own camera session.
pub struct CameraPoller {
    camera: Arc<dyn Camera>,
    camera_state: CameraState,
    download_queue: Arc<QueueProcessor<DownloadQueueTask>>,
    storage_root: PathBuf,
    poll_interval: Duration,
    was_disconnected: std::sync::atomic::AtomicBool,
}

impl CameraPoller {
    pub fn new(
        camera: Arc<dyn Camera>,
        storage_root: PathBuf,
        download_queue: Arc<QueueProcessor<DownloadQueueTask>>,
        poll_interval: Duration,
    ) -> Self {
        let camera_state = CameraState::new(&storage_root);
        Self {
            camera,
            camera_state,
            download_queue,
            storage_root,
            poll_interval,
            was_disconnected: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Run the poll loop until `shutdown` fires.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("camera poller shutting down");
                        break;
                    }
                }
                _ = self.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One poll cycle (§4.2). Camera errors abort the tick and leave the
    /// watermark unchanged; the next tick retries.
    async fn tick(&self) {
        if !self.camera.check_availability().await {
            self.record_disconnected("camera unreachable during availability check").await;
            return;
        }
        self.record_connected_if_recovering().await;

        let since = match self.camera_state.watermark().await {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "failed to read camera watermark, skipping tick");
                return;
            }
        };

        let until = Utc::now();
        let recordings = match self.camera.list_recordings(since, until).await {
            Ok(r) => r,
            Err(e) => {
                self.record_disconnected(&format!("list_recordings failed: {e}")).await;
                return;
            }
        };

        if recordings.is_empty() {
            return;
        }

        // Local paths aren't assigned per-recording: two segments in the same
        // group must land in the same group directory, named for the
        // group's earliest segment (§3), not each segment's own start.
        // Group first (on bare start/end times), then derive every member's
        // path from its group's start.
        let mut files: Vec<RecordingFile> = recordings
            .into_iter()
            .map(|r| RecordingFile::new(r.remote_path, PathBuf::new(), r.start, r.end, r.size))
            .collect();
        files.sort_by_key(|f| f.start_time);

        let newest_end = files.iter().map(|f| f.end_time).max();

        for group in group_recordings(&files) {
            let group_start = group[0].start_time;
            let group_dir = gamecam_models::group_dir_name(group_start);
            for file in group {
                let local_path = self.local_path_for(&file.remote_path, &group_dir);
                if local_path.exists() {
                    debug!(path = %local_path.display(), "recording already downloaded, skipping");
                    continue;
                }
                let task = DownloadQueueTask::DahuaDownload(DownloadTask {
                    remote_path: file.remote_path.clone(),
                    local_path: local_path.clone(),
                });
                if let Err(e) = self.download_queue.add_work(task).await {
                    warn!(error = %e, path = %local_path.display(), "failed to enqueue download task");
                }
            }
        }

        if let Some(newest_end) = newest_end {
            if let Err(e) = self.camera_state.advance_watermark(newest_end).await {
                warn!(error = %e, "failed to persist camera watermark");
            }
        }
    }

    /// `<storage>/<group_dir>/<basename(remote)>` (§4.2 step 4).
    fn local_path_for(&self, remote_path: &str, group_dir: &str) -> PathBuf {
        let basename = remote_path.rsplit('/').next().unwrap_or(remote_path);
        self.storage_root.join(group_dir).join(basename)
    }

    async fn record_disconnected(&self, message: &str) {
        if !self.was_disconnected.swap(true, std::sync::atomic::Ordering::SeqCst) {
            if let Err(e) = self
                .camera_state
                .record_event(ConnectionEventType::Disconnected, message)
                .await
            {
                warn!(error = %e, "failed to record disconnect event");
            }
        }
    }

    async fn record_connected_if_recovering(&self) {
        if self.was_disconnected.swap(false, std::sync::atomic::Ordering::SeqCst) {
            if let Err(e) = self
                .camera_state
                .record_event(ConnectionEventType::Connected, "camera reachable again")
                .await
            {
                warn!(error = %e, "failed to record connect event");
            }
        }
    }
}
