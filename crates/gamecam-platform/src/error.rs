//! Errors surfaced by the video-platform and notification collaborators.

use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("credentials not found at {0}")]
    CredentialsMissing(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned an error response: {0}")]
    Response(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
