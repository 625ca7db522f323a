//! Errors for the directory state store.

use std::path::PathBuf;
use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("timed out acquiring lock on {0}")]
    LockTimeout(PathBuf),

    #[error("state file at {0} is not valid JSON: {1}")]
    CorruptState(PathBuf, serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
