//! Orchestrator (§4.7): owns the shared configuration, constructs every
//! processor, wires `DownloadProcessor -> VideoProcessor -> UploadProcessor`,
//! and exposes `initialize()`/`shutdown()`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use gamecam_camera::{Camera, DahuaCamera, DahuaConfig};
use gamecam_models::{DownloadQueueTask, UploadQueueTask, VideoTask};
use gamecam_platform::{NotificationChannel, NtfyChannel, VideoPlatformUploader, YoutubeUploader};
use gamecam_queue::QueueProcessor;

use crate::auditor::StateAuditor;
use crate::config::PipelineConfig;
use crate::download_processor::DownloadProcessor;
use crate::error::{PipelineError, PipelineResult};
use crate::poller::CameraPoller;
use crate::upload_processor::UploadProcessor;
use crate::video_processor::VideoProcessor;

/// Constructs and wires every stage processor plus the Poller and Auditor
/// discovery loops, and owns the shutdown signal shared by all of them.
pub struct Orchestrator {
    config: PipelineConfig,
    camera: Arc<dyn Camera>,

    download_queue: Arc<QueueProcessor<DownloadQueueTask>>,
    video_queue: Arc<QueueProcessor<VideoTask>>,
    upload_queue: Arc<QueueProcessor<UploadQueueTask>>,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    poller_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    auditor_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Orchestrator {
    /// Construct the Orchestrator from a loaded configuration. Refuses to
    /// start if the configured camera kind is unknown — `PipelineConfig::load`
    /// already enforces that, so by the time a config reaches here it names
    /// only a camera kind this binary knows how to build.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let camera: Arc<dyn Camera> = match config.camera.kind.as_str() {
            "dahua" => Arc::new(DahuaCamera::new(DahuaConfig::new(
                config.camera.ip.clone(),
                config.camera.username.clone(),
                config.camera.password.clone(),
            ))),
            other => return Err(PipelineError::config(format!("unknown camera type '{other}'"))),
        };

        let download_queue = Arc::new(QueueProcessor::new(
            config.storage_path.join("download_queue_state.json"),
        ));
        let video_queue = Arc::new(QueueProcessor::new(config.storage_path.join("video_queue_state.json")));
        let upload_queue = Arc::new(QueueProcessor::new(config.storage_path.join("upload_queue_state.json")));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            camera,
            download_queue,
            video_queue,
            upload_queue,
            shutdown_tx,
            shutdown_rx,
            poller_handle: tokio::sync::Mutex::new(None),
            auditor_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Start every stage worker plus the Poller and Auditor discovery
    /// loops. Leaf stages start first so a handoff from an earlier stage
    /// never races an unstarted consumer.
    pub async fn initialize(&self) -> PipelineResult<()> {
        info!(storage = %self.config.storage_path.display(), "starting gamecam pipeline");

        let uploader: Arc<dyn VideoPlatformUploader> =
            Arc::new(YoutubeUploader::from_credentials(self.config.youtube.token_file.clone()));
        let notifier: Arc<dyn NotificationChannel> = Arc::new(NtfyChannel::new(self.config.ntfy.topic_url.clone()));
        let token_file = self.config.youtube.token_file.clone();
        let upload_worker = Arc::new(UploadProcessor::new(
            uploader,
            notifier,
            self.config.youtube.playlist_map.clone(),
            self.config.youtube.privacy_status.clone(),
            move || token_file.exists(),
        ));
        self.upload_queue.start(upload_worker).await?;

        let video_worker = Arc::new(VideoProcessor::new(self.video_queue.clone(), self.upload_queue.clone()));
        self.video_queue.start(video_worker).await?;

        let download_worker = Arc::new(DownloadProcessor::new(self.camera.clone(), self.video_queue.clone()));
        self.download_queue.start(download_worker).await?;

        let poller = CameraPoller::new(
            self.camera.clone(),
            self.config.storage_path.clone(),
            self.download_queue.clone(),
            self.config.poll_interval,
        );
        let poller_shutdown = self.shutdown_rx.clone();
        *self.poller_handle.lock().await = Some(tokio::spawn(async move {
            poller.run(poller_shutdown).await;
        }));

        let auditor = StateAuditor::new(
            self.config.storage_path.clone(),
            self.download_queue.clone(),
            self.video_queue.clone(),
            self.upload_queue.clone(),
            self.config.audit_interval,
        );
        let auditor_shutdown = self.shutdown_rx.clone();
        *self.auditor_handle.lock().await = Some(tokio::spawn(async move {
            auditor.run(auditor_shutdown).await;
        }));

        info!("gamecam pipeline initialized");
        Ok(())
    }

    /// Signal every worker, then wait for them in reverse dependency order
    /// (§4.7): Poller and Auditor first since they only produce work, then
    /// Download, then Video, then Upload. The camera collaborator itself
    /// has no explicit close step beyond dropping the last `Arc` to it,
    /// since `Camera` is a stateless HTTP collaborator in the bundled
    /// implementation.
    pub async fn shutdown(&self) {
        info!("shutting down gamecam pipeline");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.poller_handle.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.auditor_handle.lock().await.take() {
            let _ = handle.await;
        }

        self.download_queue.stop().await;
        self.video_queue.stop().await;
        self.upload_queue.stop().await;
        info!("gamecam pipeline shut down cleanly");
    }

    /// Run one audit sweep immediately, outside the periodic schedule.
    /// Used by the binary entrypoint to catch up on restart before the
    /// first scheduled sweep fires.
    pub async fn audit_once(&self) {
        let auditor = StateAuditor::new(
            self.config.storage_path.clone(),
            self.download_queue.clone(),
            self.video_queue.clone(),
            self.upload_queue.clone(),
            Duration::from_secs(0),
        );
        auditor.sweep().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_to_construct_with_unknown_camera_kind() {
        let config = PipelineConfig {
            storage_path: "/tmp/gamecam-test".into(),
            camera: crate::config::CameraSettings {
                kind: "hikvision".to_string(),
                ip: String::new(),
                username: String::new(),
                password: String::new(),
            },
            poll_interval: Duration::from_secs(60),
            audit_interval: Duration::from_secs(300),
            youtube: crate::config::YoutubeSettings {
                token_file: "/tmp/token.json".into(),
                privacy_status: "unlisted".to_string(),
                playlist_map: Default::default(),
            },
            ntfy: crate::config::NtfySettings {
                topic_url: "https://ntfy.sh/test".to_string(),
            },
        };

        assert!(Orchestrator::new(config).is_err());
    }
}
