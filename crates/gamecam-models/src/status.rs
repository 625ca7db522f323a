//! Per-file and per-group status lattices for `state.json`.

use serde::{Deserialize, Serialize};

/// Status of a single file within a group's `state.json`.
///
/// Forms the lattice `queued -> downloading -> downloaded -> converted ->
/// combined` (terminal), with `download_failed`/`convert_failed` reachable
/// from their respective predecessors. `skip` is an orthogonal flag, not a
/// status: a skipped file is removed from further consideration regardless
/// of which status it's parked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Queued,
    Downloading,
    Downloaded,
    DownloadFailed,
    Converted,
    ConvertFailed,
    Combined,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::DownloadFailed => "download_failed",
            Self::Converted => "converted",
            Self::ConvertFailed => "convert_failed",
            Self::Combined => "combined",
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::DownloadFailed | Self::ConvertFailed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Combined)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a group as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    #[default]
    Pending,
    Downloading,
    Downloaded,
    Combined,
    Trimmed,
    AutocamComplete,
    YoutubeUploaded,
    Failed,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Combined => "combined",
            Self::Trimmed => "trimmed",
            Self::AutocamComplete => "autocam_complete",
            Self::YoutubeUploaded => "youtube_uploaded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::YoutubeUploaded | Self::Failed)
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-file record inside `state.json`'s `files` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FileRecord {
    pub fn new(status: FileStatus) -> Self {
        Self {
            status,
            skip: false,
            last_error: None,
        }
    }

    /// A skipped file is out of consideration no matter its status.
    pub fn is_active(&self) -> bool {
        !self.skip
    }
}
