//! Pipeline configuration: a strongly-typed record built once at startup
//! from `config.ini` (§9 "prefer a strongly-typed configuration record
//! produced once at startup, not a dynamically keyed dictionary").
//!
//! `config.ini` is located by searching, in order, the current directory,
//! the binary's directory, its parent, and `./video_grouper/` (§6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gamecam_platform::PlaylistMap;

use crate::error::{PipelineError, PipelineResult};

/// The only camera family this pipeline ships a reference implementation
/// for. The Orchestrator refuses to start if `config.ini` names anything
/// else (§4.7).
pub const KNOWN_CAMERA_KINDS: &[&str] = &["dahua"];

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub kind: String,
    pub ip: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct YoutubeSettings {
    pub token_file: PathBuf,
    pub privacy_status: String,
    pub playlist_map: PlaylistMap,
}

#[derive(Debug, Clone)]
pub struct NtfySettings {
    pub topic_url: String,
}

/// Top-level pipeline configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub storage_path: PathBuf,
    pub camera: CameraSettings,
    pub poll_interval: Duration,
    pub audit_interval: Duration,
    pub youtube: YoutubeSettings,
    pub ntfy: NtfySettings,
}

impl PipelineConfig {
    /// Search the standard locations for `config.ini`, starting from the
    /// current directory (§6 "Command-line surface").
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));

        let mut candidates = vec![cwd.join("config.ini")];
        if let Some(exe_dir) = &exe_dir {
            candidates.push(exe_dir.join("config.ini"));
            if let Some(parent) = exe_dir.parent() {
                candidates.push(parent.join("config.ini"));
            }
        }
        candidates.push(cwd.join("video_grouper").join("config.ini"));

        candidates.into_iter().find(|p| p.exists())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let conf = ini::Ini::load_from_file(path)
            .map_err(|e| PipelineError::config(format!("failed to parse {}: {e}", path.display())))?;

        let storage_section = conf
            .section(Some("storage"))
            .ok_or_else(|| PipelineError::config("missing [storage] section in config.ini"))?;
        let storage_path = storage_section
            .get("path")
            .ok_or_else(|| PipelineError::config("missing storage.path in config.ini"))?;

        let camera_section = conf
            .section(Some("camera"))
            .ok_or_else(|| PipelineError::config("missing [camera] section in config.ini"))?;
        let kind = camera_section
            .get("type")
            .ok_or_else(|| PipelineError::config("missing camera.type in config.ini"))?
            .to_lowercase();
        if !KNOWN_CAMERA_KINDS.contains(&kind.as_str()) {
            return Err(PipelineError::config(format!(
                "unknown camera type '{kind}', expected one of {KNOWN_CAMERA_KINDS:?}"
            )));
        }
        let camera = CameraSettings {
            kind,
            ip: camera_section.get("ip").unwrap_or_default().to_string(),
            username: camera_section.get("username").unwrap_or_default().to_string(),
            password: camera_section.get("password").unwrap_or_default().to_string(),
        };

        let poll_interval = camera_section
            .get("poll_interval_secs")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let audit_interval = conf
            .section(Some("auditor"))
            .and_then(|s| s.get("interval_secs"))
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        let youtube_section = conf.section(Some("youtube"));
        let token_file = youtube_section
            .and_then(|s| s.get("token_file"))
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(storage_path).join("youtube").join("token.json"));
        let privacy_status = youtube_section
            .and_then(|s| s.get("privacy_status"))
            .unwrap_or("unlisted")
            .to_string();

        let mut playlist_map = HashMap::new();
        if let Some(section) = conf.section(Some("youtube.playlist_map")) {
            for (team, playlist) in section.iter() {
                playlist_map.insert(team.to_string(), playlist.to_string());
            }
        }

        let ntfy_section = conf.section(Some("ntfy"));
        let ntfy = NtfySettings {
            topic_url: ntfy_section
                .and_then(|s| s.get("topic_url"))
                .unwrap_or("https://ntfy.sh/gamecam")
                .to_string(),
        };

        Ok(Self {
            storage_path: PathBuf::from(storage_path),
            camera,
            poll_interval,
            audit_interval,
            youtube: YoutubeSettings {
                token_file,
                privacy_status,
                playlist_map: PlaylistMap::new(playlist_map),
            },
            ntfy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.ini");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_minimal_config() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[storage]\npath = /data/recordings\n\n[camera]\ntype = dahua\nip = 10.0.0.5\nusername = admin\npassword = secret\n",
        );
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/data/recordings"));
        assert_eq!(config.camera.kind, "dahua");
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn unknown_camera_type_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[storage]\npath = /data\n\n[camera]\ntype = hikvision\n",
        );
        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn parses_playlist_map_section() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[storage]\npath = /data\n\n[camera]\ntype = dahua\n\n[youtube.playlist_map]\nSharks = Sharks 2024\n",
        );
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.youtube.playlist_map.get("Sharks"), Some("Sharks 2024"));
    }
}
