//! Durable task types carried by the per-stage queues.
//!
//! Tasks are serializable to and from JSON and carry exactly the data needed
//! to execute them — no live object references (§3 of the data model). Each
//! queue owns one [`Task`] variant family; `task_key` is the stable
//! deduplication string a stage uses to decide whether work is already
//! enqueued.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A recording segment queued for download from the camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub remote_path: String,
    pub local_path: PathBuf,
}

impl DownloadTask {
    pub fn task_key(&self) -> String {
        format!("download:{}", self.local_path.display())
    }
}

/// Transcode one downloaded `.dav` segment to `.mp4`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertTask {
    pub file_path: PathBuf,
}

impl ConvertTask {
    pub fn task_key(&self) -> String {
        format!("convert:{}", self.file_path.display())
    }
}

/// Concatenate a group's `.mp4` segments into `combined.mp4`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineTask {
    pub group_dir: PathBuf,
}

impl CombineTask {
    pub fn task_key(&self) -> String {
        format!("combine:{}", self.group_dir.display())
    }
}

/// Trim the combined artifact to the match window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimTask {
    pub group_dir: PathBuf,
    pub start_offset_secs: f64,
    pub end_offset_secs: Option<f64>,
}

impl TrimTask {
    pub fn task_key(&self) -> String {
        format!("trim:{}", self.group_dir.display())
    }
}

/// Upload the trimmed and raw artifacts to the video platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeUploadTask {
    pub group_dir: PathBuf,
}

impl YoutubeUploadTask {
    pub fn task_key(&self) -> String {
        format!("youtube_upload:{}", self.group_dir.display())
    }
}

/// Tasks routed to the Video Processor's single queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum VideoTask {
    Convert(ConvertTask),
    Combine(CombineTask),
    Trim(TrimTask),
}

impl VideoTask {
    pub fn task_key(&self) -> String {
        match self {
            Self::Convert(t) => t.task_key(),
            Self::Combine(t) => t.task_key(),
            Self::Trim(t) => t.task_key(),
        }
    }
}

/// Tasks routed to the Download Processor's queue. `task_type` is pinned to
/// `dahua_download` per §3/§6 — the camera collaborator family is a config
/// choice, not a per-task one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum DownloadQueueTask {
    DahuaDownload(DownloadTask),
}

impl DownloadQueueTask {
    pub fn task_key(&self) -> String {
        match self {
            Self::DahuaDownload(t) => t.task_key(),
        }
    }
}

/// Tasks routed to the Upload Processor's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum UploadQueueTask {
    YoutubeUpload(YoutubeUploadTask),
}

impl UploadQueueTask {
    pub fn task_key(&self) -> String {
        match self {
            Self::YoutubeUpload(t) => t.task_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_task_serde_roundtrip() {
        let task = VideoTask::Trim(TrimTask {
            group_dir: "/storage/2024.01.01-10.00.00".into(),
            start_offset_secs: 300.0,
            end_offset_secs: Some(5700.0),
        });
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"task_type\":\"trim\""));
        let back: VideoTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_key(), task.task_key());
    }

    #[test]
    fn task_key_is_stable_dedup_identity() {
        let a = ConvertTask {
            file_path: "/x/a.dav".into(),
        };
        let b = ConvertTask {
            file_path: "/x/a.dav".into(),
        };
        assert_eq!(a.task_key(), b.task_key());
    }
}
