//! `match_info.ini`: the human-filled document that drives Trim.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recording::parse_group_dir_name;
use crate::timestamp::{parse_timestamp, TimestampError};

#[derive(Debug, thiserror::Error)]
pub enum MatchInfoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ini parse error: {0}")]
    Ini(#[from] ini::Error),
    #[error("invalid timestamp in match_info.ini: {0}")]
    Timestamp(#[from] TimestampError),
}

/// Required and optional fields of `match_info.ini`'s `[match]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchInfo {
    pub my_team_name: Option<String>,
    pub opponent_team_name: Option<String>,
    pub location: Option<String>,
    pub start_time_offset: Option<String>,
    pub end_time_offset: Option<String>,
    pub total_duration: Option<String>,
}

impl MatchInfo {
    const SECTION: &'static str = "match";

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MatchInfoError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let conf = ini::Ini::load_from_file(path)?;
        let section = conf.section(Some(Self::SECTION));
        let get = |key: &str| -> Option<String> {
            section
                .and_then(|s| s.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            my_team_name: get("my_team_name"),
            opponent_team_name: get("opponent_team_name"),
            location: get("location"),
            start_time_offset: get("start_time_offset"),
            end_time_offset: get("end_time_offset"),
            total_duration: get("total_duration"),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MatchInfoError> {
        let mut conf = ini::Ini::new();
        {
            let mut section = conf.with_section(Some(Self::SECTION));
            if let Some(v) = &self.my_team_name {
                section.set("my_team_name", v);
            }
            if let Some(v) = &self.opponent_team_name {
                section.set("opponent_team_name", v);
            }
            if let Some(v) = &self.location {
                section.set("location", v);
            }
            if let Some(v) = &self.start_time_offset {
                section.set("start_time_offset", v);
            }
            if let Some(v) = &self.end_time_offset {
                section.set("end_time_offset", v);
            }
            if let Some(v) = &self.total_duration {
                section.set("total_duration", v);
            }
        }
        conf.write_to_file(path)?;
        Ok(())
    }

    /// A group is ready-to-trim iff the four required fields are non-empty.
    pub fn is_ready_to_trim(&self) -> bool {
        self.my_team_name.is_some()
            && self.opponent_team_name.is_some()
            && self.location.is_some()
            && self.start_time_offset.is_some()
    }

    /// Parsed start/end offsets in seconds into the combined artifact, if
    /// ready to trim. `end` is `None` when `end_time_offset` is absent.
    pub fn trim_window_secs(&self) -> Result<Option<(f64, Option<f64>)>, MatchInfoError> {
        if !self.is_ready_to_trim() {
            return Ok(None);
        }
        let start = parse_timestamp(self.start_time_offset.as_deref().unwrap())?;
        let end = self
            .end_time_offset
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        Ok(Some((start, end)))
    }

    /// The output path Trim writes to (§4.4, §6):
    /// `group_dir/<YYYY.MM.DD - MyTeam vs Opp (loc)>/<myteam-opp-loc-MM-DD-YYYY-raw.mp4>`.
    /// `None` if `group_dir`'s own name isn't a recognised group directory.
    pub fn trim_output_path(&self, group_dir: &Path) -> Option<PathBuf> {
        let my_team = self.my_team_name.clone().unwrap_or_else(|| "unknown".to_string());
        let opponent = self
            .opponent_team_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let location = self.location.clone().unwrap_or_else(|| "unknown".to_string());

        let group_name = group_dir.file_name().and_then(|n| n.to_str())?;
        let start = parse_group_dir_name(group_name)?;

        let date_display = start.format("%Y.%m.%d").to_string();
        let date_filename = start.format("%m-%d-%Y").to_string();

        let subdir = format!("{date_display} - {my_team} vs {opponent} ({location})");
        let filename = format!(
            "{}-{}-{}-{}-raw.mp4",
            slug(&my_team),
            slug(&opponent),
            slug(&location),
            date_filename
        );

        Some(group_dir.join(subdir).join(filename))
    }
}

fn slug(value: &str) -> String {
    value.to_lowercase().split_whitespace().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_not_ready() {
        let dir = tempdir().unwrap();
        let info = MatchInfo::load(dir.path().join("match_info.ini")).unwrap();
        assert!(!info.is_ready_to_trim());
    }

    #[test]
    fn round_trips_and_detects_ready() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("match_info.ini");
        let info = MatchInfo {
            my_team_name: Some("Sharks".into()),
            opponent_team_name: Some("Rays".into()),
            location: Some("Field 3".into()),
            start_time_offset: Some("00:05:00".into()),
            end_time_offset: Some("01:35:00".into()),
            total_duration: None,
        };
        info.save(&path).unwrap();
        let loaded = MatchInfo::load(&path).unwrap();
        assert!(loaded.is_ready_to_trim());
        let (start, end) = loaded.trim_window_secs().unwrap().unwrap();
        assert_eq!(start, 300.0);
        assert_eq!(end, Some(5700.0));
    }

    #[test]
    fn missing_required_field_is_not_ready() {
        let info = MatchInfo {
            my_team_name: Some("Sharks".into()),
            ..Default::default()
        };
        assert!(!info.is_ready_to_trim());
    }
}
