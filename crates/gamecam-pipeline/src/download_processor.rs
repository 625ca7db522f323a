//! Download Processor (§4.3): one worker, one file at a time, streaming a
//! segment off the camera and handing it to the Video Processor on success.

use std::sync::Arc;

use async_trait::async_trait;

use gamecam_camera::Camera;
use gamecam_models::{ConvertTask, DownloadQueueTask, FileStatus, VideoTask};
use gamecam_queue::{QueueProcessor, StageWorker};
use gamecam_state::DirectoryState;

use crate::logging::StageLogger;

/// Drives [`DownloadQueueTask`]s against a [`Camera`] collaborator, routing
/// the converted file on to the Video queue.
pub struct DownloadProcessor {
    camera: Arc<dyn Camera>,
    video_queue: Arc<QueueProcessor<VideoTask>>,
}

impl DownloadProcessor {
    pub fn new(camera: Arc<dyn Camera>, video_queue: Arc<QueueProcessor<VideoTask>>) -> Self {
        Self { camera, video_queue }
    }
}

#[async_trait]
impl StageWorker<DownloadQueueTask> for DownloadProcessor {
    async fn process_item(&self, item: DownloadQueueTask) -> anyhow::Result<()> {
        let DownloadQueueTask::DahuaDownload(task) = item;
        let logger = StageLogger::new("download", task.task_key());
        let _span = logger.span().entered();

        let group_dir = task
            .local_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("local_path {} has no parent", task.local_path.display()))?;
        let state = DirectoryState::new(group_dir);

        logger.started("downloading segment");
        state
            .update_file_state(&task.local_path, FileStatus::Downloading)
            .await?;

        match self
            .camera
            .download_file(&task.remote_path, &task.local_path)
            .await
        {
            Ok(_bytes) => {
                state
                    .update_file_state(&task.local_path, FileStatus::Downloaded)
                    .await?;
                logger.succeeded("segment downloaded");

                let convert = VideoTask::Convert(ConvertTask {
                    file_path: task.local_path.clone(),
                });
                self.video_queue.add_work(convert).await?;
            }
            Err(e) => {
                state
                    .mark_file_failed(&task.local_path, FileStatus::DownloadFailed, e.to_string())
                    .await?;
                logger.failed(&format!("download failed: {e}"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;
    use chrono::{DateTime, Utc};
    use gamecam_camera::{CameraError, CameraResult, RemoteRecording};
    use gamecam_models::DownloadTask;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    struct FakeCamera {
        fail: AtomicBool,
    }

    #[at]
    impl Camera for FakeCamera {
        async fn check_availability(&self) -> bool {
            true
        }

        async fn list_recordings(
            &self,
            _since: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> CameraResult<Vec<RemoteRecording>> {
            Ok(vec![])
        }

        async fn download_file(&self, _remote: &str, local: &Path) -> CameraResult<u64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CameraError::Unreachable("simulated".into()));
            }
            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent).await.unwrap();
            }
            tokio::fs::write(local, b"data").await.unwrap();
            Ok(4)
        }
    }

    #[tokio::test]
    async fn successful_download_marks_downloaded_and_enqueues_convert() {
        let dir = tempdir().unwrap();
        let group_dir = dir.path().join("2024.01.01-10.00.00");
        let local_path = group_dir.join("001.dav");

        let camera = Arc::new(FakeCamera { fail: AtomicBool::new(false) });
        let video_queue = Arc::new(QueueProcessor::new(dir.path().join("video_queue_state.json")));
        let processor = DownloadProcessor::new(camera, video_queue.clone());

        let task = DownloadQueueTask::DahuaDownload(DownloadTask {
            remote_path: "/mnt/dvr/001.dav".to_string(),
            local_path: local_path.clone(),
        });
        processor.process_item(task).await.unwrap();

        let state = DirectoryState::new(&group_dir);
        let doc = state.read().await.unwrap();
        assert_eq!(doc.files[&local_path].status, FileStatus::Downloaded);
        assert_eq!(video_queue.len().await, 1);
    }

    #[tokio::test]
    async fn failed_download_marks_download_failed_and_enqueues_nothing() {
        let dir = tempdir().unwrap();
        let group_dir = dir.path().join("2024.01.01-10.00.00");
        let local_path = group_dir.join("001.dav");

        let camera = Arc::new(FakeCamera { fail: AtomicBool::new(true) });
        let video_queue = Arc::new(QueueProcessor::new(dir.path().join("video_queue_state.json")));
        let processor = DownloadProcessor::new(camera, video_queue.clone());

        let task = DownloadQueueTask::DahuaDownload(DownloadTask {
            remote_path: "/mnt/dvr/001.dav".to_string(),
            local_path: local_path.clone(),
        });
        processor.process_item(task).await.unwrap();

        let state = DirectoryState::new(&group_dir);
        let doc = state.read().await.unwrap();
        assert_eq!(doc.files[&local_path].status, FileStatus::DownloadFailed);
        assert!(doc.files[&local_path].last_error.is_some());
        assert!(video_queue.is_empty().await);
    }
}
