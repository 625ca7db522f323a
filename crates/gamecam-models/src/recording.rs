//! Recording files and the groups they're collected into.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Segments whose end/next-start gap is within this many seconds belong to the
/// same [`Group`].
pub const GROUP_GAP_SECS: i64 = 5;

/// A single segment produced by the camera.
///
/// Two `RecordingFile`s are the same physical recording iff their `local_path`s
/// are equal; that's the deduplication key used throughout the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    /// Camera-side path, as returned by the recording index.
    pub remote_path: String,
    /// Target path on local storage.
    pub local_path: PathBuf,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub size: u64,
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, String>,
}

impl RecordingFile {
    pub fn new(
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        size: u64,
    ) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            start_time,
            end_time,
            size,
            metadata: Default::default(),
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// Does `next` belong to the same group as `prev` under the 5-second
/// proximity rule? Exactly 5.0s is still the same group; anything past that
/// starts a new one.
pub fn same_group(prev_end: DateTime<Utc>, next_start: DateTime<Utc>) -> bool {
    (next_start - prev_end) <= chrono::Duration::seconds(GROUP_GAP_SECS)
}

/// Directory naming convention for a group: `YYYY.MM.DD-HH.MM.SS`.
pub fn group_dir_name(start: DateTime<Utc>) -> String {
    start.format("%Y.%m.%d-%H.%M.%S").to_string()
}

/// Parse a group directory name back into its start timestamp.
pub fn parse_group_dir_name(name: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(name, "%Y.%m.%d-%H.%M.%S").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// A local-storage directory grouping the segments of one recorded session.
#[derive(Debug, Clone)]
pub struct Group {
    pub dir: PathBuf,
    pub start_time: DateTime<Utc>,
}

impl Group {
    pub fn new(storage_root: impl AsRef<Path>, start_time: DateTime<Utc>) -> Self {
        let dir = storage_root.as_ref().join(group_dir_name(start_time));
        Self { dir, start_time }
    }

    pub fn from_dir(dir: PathBuf) -> Option<Self> {
        let name = dir.file_name()?.to_str()?;
        let start_time = parse_group_dir_name(name)?;
        Some(Self { dir, start_time })
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    pub fn match_info_file(&self) -> PathBuf {
        self.dir.join("match_info.ini")
    }

    pub fn combined_file(&self) -> PathBuf {
        self.dir.join("combined.mp4")
    }
}

/// Given an ordered sequence of discovered recordings (already sorted by
/// start time), partition them into groups using the 5-second proximity rule.
/// A group's start is the start of its earliest segment.
pub fn group_recordings(recordings: &[RecordingFile]) -> Vec<Vec<RecordingFile>> {
    let mut groups: Vec<Vec<RecordingFile>> = Vec::new();
    for rec in recordings {
        match groups.last_mut() {
            Some(group) if same_group(group.last().unwrap().end_time, rec.start_time) => {
                group.push(rec.clone());
            }
            _ => groups.push(vec![rec.clone()]),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn exactly_five_seconds_same_group() {
        assert!(same_group(t(0), t(5)));
    }

    #[test]
    fn just_over_five_seconds_new_group() {
        assert!(!same_group(t(0), t(6)));
    }

    #[test]
    fn group_dir_name_round_trips() {
        let start = t(0);
        let name = group_dir_name(start);
        assert_eq!(parse_group_dir_name(&name), Some(start));
    }

    #[test]
    fn groups_segments_by_gap() {
        let recs = vec![
            RecordingFile::new("a", "/a", t(0), t(10), 1),
            RecordingFile::new("b", "/b", t(15), t(20), 1),
            RecordingFile::new("c", "/c", t(100), t(110), 1),
        ];
        let groups = group_recordings(&recs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
    }
}
