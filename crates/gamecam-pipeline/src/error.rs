//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("camera error: {0}")]
    Camera(#[from] gamecam_camera::CameraError),

    #[error("media error: {0}")]
    Media(#[from] gamecam_media::MediaError),

    #[error("state error: {0}")]
    State(#[from] gamecam_state::StateError),

    #[error("queue error: {0}")]
    Queue(#[from] gamecam_queue::QueueError),

    #[error("platform error: {0}")]
    Platform(#[from] gamecam_platform::PlatformError),

    #[error("match_info error: {0}")]
    MatchInfo(#[from] gamecam_models::MatchInfoError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
