//! Convert, Combine and Trim: the three FFmpeg operations the Video
//! Processor stage drives (§4.4).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::get_duration;

/// Tolerance for duration comparisons. The spec leaves `epsilon` unset in the
/// source; 0.5s covers container/stream-copy rounding without masking a real
/// mismatch.
pub const DURATION_EPSILON_SECS: f64 = 0.5;

/// `ffprobe` sometimes reports 0.0 on a file the transcoder has only just
/// closed; give it this many extra chances before calling it corrupt.
const PROBE_RETRIES: u32 = 2;
const PROBE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Transcode `dav_path` to an `.mp4` counterpart at `mp4_path`: video stream
/// copy, audio re-encoded to a lossless codec so a lossy source codec the
/// container can't carry doesn't block the copy.
pub async fn convert(dav_path: &Path, mp4_path: &Path) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(dav_path, mp4_path)
        .video_codec("copy")
        .audio_codec("pcm_s16le");
    FfmpegRunner::new().run(&cmd).await
}

/// Probe both files (with retry-with-backoff on the transcoded side) and
/// confirm their durations agree within [`DURATION_EPSILON_SECS`].
pub async fn verify_mp4_duration(dav_path: &Path, mp4_path: &Path) -> MediaResult<()> {
    if !mp4_path.exists() {
        return Err(MediaError::FileNotFound(mp4_path.to_path_buf()));
    }

    let dav_duration = get_duration(dav_path).await?;

    let mut last_err = None;
    for attempt in 0..=PROBE_RETRIES {
        match get_duration(mp4_path).await {
            Ok(mp4_duration) if mp4_duration > 0.0 => {
                if (dav_duration - mp4_duration).abs() <= DURATION_EPSILON_SECS {
                    return Ok(());
                }
                return Err(MediaError::InvalidVideo(format!(
                    "duration mismatch: {dav_duration:.3}s (dav) vs {mp4_duration:.3}s (mp4)"
                )));
            }
            Ok(zero) => {
                warn!(
                    attempt,
                    duration = zero,
                    "ffprobe reported zero duration on converted file, retrying"
                );
                last_err = Some(MediaError::InvalidVideo(
                    "ffprobe reported zero duration".to_string(),
                ));
            }
            Err(e) => {
                warn!(attempt, error = %e, "ffprobe failed on converted file, retrying");
                last_err = Some(e);
            }
        }
        if attempt < PROBE_RETRIES {
            tokio::time::sleep(PROBE_RETRY_DELAY).await;
        }
    }

    Err(last_err.unwrap_or_else(|| MediaError::InvalidVideo("probe retries exhausted".into())))
}

/// Start-time embedded in a `.dav`/`.mp4` segment filename, used to order the
/// combine manifest. Segment basenames are opaque camera identifiers with no
/// guaranteed lexical order tied to capture time, so sort on filesystem
/// modified time as the practical stand-in the filename can't give us.
fn segment_sort_key(path: &Path) -> std::io::Result<std::time::SystemTime> {
    std::fs::metadata(path)?.modified()
}

/// Build the ordered list of `.mp4` files in `group_dir` for Combine,
/// sorted by capture order.
pub fn ordered_segment_mp4s(group_dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(group_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("mp4"))
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some("combined.mp4"))
        .collect();

    entries.sort_by_key(|p| segment_sort_key(p).unwrap_or(std::time::SystemTime::UNIX_EPOCH));
    Ok(entries)
}

/// Concatenate `group_dir`'s `.mp4` segments into `group_dir/combined.mp4`
/// via a stream-copy concat demuxer. Any pre-existing manifest/combined file
/// is removed first so re-running produces one clean set of entries instead
/// of duplicating them.
pub async fn combine(group_dir: &Path) -> MediaResult<PathBuf> {
    let segments = ordered_segment_mp4s(group_dir)?;
    if segments.is_empty() {
        return Err(MediaError::InvalidVideo(
            "no segment .mp4 files to combine".to_string(),
        ));
    }

    let manifest_path = group_dir.join("concat_manifest.txt");
    let combined_path = group_dir.join("combined.mp4");

    if manifest_path.exists() {
        std::fs::remove_file(&manifest_path)?;
    }
    if combined_path.exists() {
        std::fs::remove_file(&combined_path)?;
    }

    let manifest = segments
        .iter()
        .map(|p| format!("file '{}'", p.display().to_string().replace('\'', "'\\''")))
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(&manifest_path, manifest)?;

    let cmd = FfmpegCommand::new(&manifest_path, &combined_path)
        .input_args(["-f", "concat", "-safe", "0"])
        .video_codec("copy")
        .audio_codec("copy");

    FfmpegRunner::new().run(&cmd).await?;

    debug!(segments = segments.len(), "combined group into single artifact");
    Ok(combined_path)
}

/// Trim `combined.mp4` to `[start, end)` and write it to `output_path`.
/// Stream-copy: the combined artifact's keyframe spacing determines actual
/// cut precision, which is acceptable for a raw/full-field artifact.
pub async fn trim(
    combined_path: &Path,
    output_path: &Path,
    start_secs: f64,
    end_secs: Option<f64>,
) -> MediaResult<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cmd = FfmpegCommand::new(combined_path, output_path)
        .seek(start_secs)
        .video_codec("copy")
        .audio_codec("copy");

    if let Some(end) = end_secs {
        cmd = cmd.duration((end - start_secs).max(0.0));
    }

    FfmpegRunner::new().run(&cmd).await
}

/// Is `output_path` already a valid trim for `[start, end)`? If so, Trim is
/// a no-op: no subprocess is spawned and the existing file is left in place
/// (§4.4 idempotence).
pub async fn trim_output_is_valid(
    output_path: &Path,
    start_secs: f64,
    end_secs: Option<f64>,
) -> bool {
    let Some(expected_duration) = end_secs.map(|e| (e - start_secs).max(0.0)) else {
        return false;
    };

    let Ok(meta) = std::fs::metadata(output_path) else {
        return false;
    };
    if meta.len() == 0 {
        return false;
    }

    match get_duration(output_path).await {
        Ok(actual) => (actual - expected_duration).abs() <= DURATION_EPSILON_SECS,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn trim_output_missing_is_invalid() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-file.mp4");
        assert!(!trim_output_is_valid(&missing, 0.0, Some(90.0)).await);
    }

    #[tokio::test]
    async fn trim_output_without_end_offset_is_never_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        std::fs::write(&path, b"not really mp4 but non-empty").unwrap();
        assert!(!trim_output_is_valid(&path, 0.0, None).await);
    }

    #[test]
    fn ordered_segment_mp4s_excludes_combined() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("combined.mp4"), b"c").unwrap();
        let segs = ordered_segment_mp4s(dir.path()).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].file_name().unwrap(), "a.mp4");
    }
}
