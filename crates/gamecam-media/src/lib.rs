//! FFmpeg-backed media operations for the recording pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a cancellable/timeout-aware runner
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe-based video info and duration
//! - The Convert/Combine/Trim operations the Video Processor stage drives,
//!   including the duration-verification and trim-idempotence checks §4.4
//!   requires

pub mod command;
pub mod error;
pub mod ops;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use ops::{
    combine, convert, ordered_segment_mp4s, trim, trim_output_is_valid, verify_mp4_duration,
    DURATION_EPSILON_SECS,
};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
