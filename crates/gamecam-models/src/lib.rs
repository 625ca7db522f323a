//! Shared data models for the gamecam recording-ingestion pipeline.
//!
//! Types here are deliberately free of stage logic: recordings and groups
//! (§3), the file/group status lattices backing `state.json`, the durable
//! task variants carried by each stage's queue, `match_info.ini`, and
//! timestamp parsing shared by match info and trim windows.

pub mod match_info;
pub mod recording;
pub mod status;
pub mod task;
pub mod timestamp;

pub use match_info::{MatchInfo, MatchInfoError};

pub use recording::{
    group_dir_name, group_recordings, parse_group_dir_name, same_group, Group, RecordingFile,
    GROUP_GAP_SECS,
};
pub use status::{FileRecord, FileStatus, GroupStatus};
pub use task::{
    CombineTask, ConvertTask, DownloadQueueTask, DownloadTask, TrimTask, UploadQueueTask,
    VideoTask, YoutubeUploadTask,
};
pub use timestamp::{format_seconds, normalize_timestamp, parse_timestamp, TimestampError};
