//! Errors surfaced by camera collaborators.

use thiserror::Error;

pub type CameraResult<T> = Result<T, CameraError>;

/// All camera errors are treated as transient by the Poller and Download
/// Processor (§7): logged, no state mutation beyond the file/group status
/// the caller already manages, retried on the next tick or by the Auditor.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera unreachable: {0}")]
    Unreachable(String),

    #[error("camera authentication failed")]
    AuthFailed,

    #[error("camera returned an unexpected response: {0}")]
    Protocol(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("size mismatch after download: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}
