//! Upload Processor (§4.5): uploads the trimmed raw artifact and its
//! optional processed sibling to the video platform, resolving a playlist
//! name via the in-process map with an NTFY fallback for the ones it
//! doesn't know.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use gamecam_models::{GroupStatus, MatchInfo, UploadQueueTask, YoutubeUploadTask};
use gamecam_platform::{NotificationChannel, PlaylistMap, VideoPlatformUploader};
use gamecam_queue::StageWorker;
use gamecam_state::DirectoryState;

use crate::logging::StageLogger;

/// Drives `youtube_upload` tasks against a [`VideoPlatformUploader`]
/// collaborator, asking a human (via [`NotificationChannel`]) for a
/// playlist name it doesn't already know.
pub struct UploadProcessor {
    uploader: Arc<dyn VideoPlatformUploader>,
    notifier: Arc<dyn NotificationChannel>,
    playlist_map: PlaylistMap,
    privacy_status: String,
    credentials_present: Box<dyn Fn() -> bool + Send + Sync>,
}

impl UploadProcessor {
    pub fn new(
        uploader: Arc<dyn VideoPlatformUploader>,
        notifier: Arc<dyn NotificationChannel>,
        playlist_map: PlaylistMap,
        privacy_status: impl Into<String>,
        credentials_present: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            uploader,
            notifier,
            playlist_map,
            privacy_status: privacy_status.into(),
            credentials_present: Box::new(credentials_present),
        }
    }

    async fn handle(&self, task: YoutubeUploadTask) -> anyhow::Result<()> {
        let logger = StageLogger::new("upload", task.task_key());

        // Missing credentials are a human-operator gap, not an error state
        // (§4.5 step 1) — log and drop, no state mutation.
        if !(self.credentials_present)() {
            logger.warned("no upload credentials present, dropping task for an operator to provide them");
            return Ok(());
        }

        let match_info = MatchInfo::load(task.group_dir.join("match_info.ini"))?;
        let Some(team_name) = match_info.my_team_name.clone() else {
            logger.warned("match_info has no my_team_name, cannot resolve playlist");
            return Ok(());
        };

        let state = DirectoryState::new(&task.group_dir);
        let doc = state.read().await?;

        // `doc.youtube_playlist_name` is the one group-level slot for this
        // (§3): it holds the name a human supplied via NTFY once the reply
        // lands, and resolution consults it before the static map so that
        // round-trip completes on the Auditor's next pass.
        let playlist_name = if let Some(existing) = doc.youtube_playlist_name.clone() {
            existing
        } else if let Some(name) = self.playlist_map.get(&team_name) {
            name.to_string()
        } else {
            if !self.notifier.is_waiting_for_input(&task.group_dir).await {
                self.notifier
                    .request_playlist_name(&task.group_dir, &team_name)
                    .await?;
                logger.started("requested playlist name from operator via NTFY");
            } else {
                logger.started("already waiting on an operator reply for the playlist name");
            }
            // Not an error: the task simply isn't done yet. The Auditor
            // re-issues once a human reply writes `youtube_playlist_name`
            // into state.json.
            return Ok(());
        };

        let playlist_id = self
            .uploader
            .get_or_create_playlist(&playlist_name, &playlist_name)
            .await?;

        let Some((raw_path, processed_path)) = trimmed_outputs(&task.group_dir)? else {
            logger.warned("no trimmed raw output found, leaving group at trimmed for retry");
            return Ok(());
        };

        let title = format!(
            "{} vs {}",
            match_info.my_team_name.as_deref().unwrap_or("Unknown"),
            match_info.opponent_team_name.as_deref().unwrap_or("Unknown")
        );
        let description = match_info
            .location
            .as_deref()
            .map(|loc| format!("Played at {loc}"))
            .unwrap_or_default();

        logger.started("uploading raw artifact");
        if let Err(e) = self
            .uploader
            .upload_video(&raw_path, &title, &description, &self.privacy_status, playlist_id.as_deref())
            .await
        {
            logger.failed(&format!("raw upload failed: {e}"));
            return Ok(());
        }

        if let Some(processed_path) = processed_path {
            logger.started("uploading processed artifact");
            if let Err(e) = self
                .uploader
                .upload_video(
                    &processed_path,
                    &title,
                    &description,
                    &self.privacy_status,
                    playlist_id.as_deref(),
                )
                .await
            {
                logger.failed(&format!("processed upload failed: {e}"));
                return Ok(());
            }
        } else {
            warn!(group = %task.group_dir.display(), "no processed sibling present, uploading raw only");
        }

        state.set_group_status(GroupStatus::YoutubeUploaded).await?;
        logger.succeeded("group uploaded");
        Ok(())
    }
}

/// Find the `*-raw.mp4` trimmed output under `group_dir`'s match subfolder
/// and its optional processed sibling (same stem, no `-raw` suffix) (§4.5
/// step 3, §6 filesystem layout).
fn trimmed_outputs(group_dir: &Path) -> anyhow::Result<Option<(PathBuf, Option<PathBuf>)>> {
    for entry in std::fs::read_dir(group_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let subdir = entry.path();
        for file in std::fs::read_dir(&subdir)? {
            let file = file?;
            let path = file.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(stem) = name.strip_suffix("-raw.mp4") {
                let processed = subdir.join(format!("{stem}.mp4"));
                let processed = processed.exists().then_some(processed);
                return Ok(Some((path, processed)));
            }
        }
    }
    Ok(None)
}

#[async_trait]
impl StageWorker<UploadQueueTask> for UploadProcessor {
    async fn process_item(&self, item: UploadQueueTask) -> anyhow::Result<()> {
        let UploadQueueTask::YoutubeUpload(task) = item;
        self.handle(task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamecam_platform::{NotificationAction, PlatformResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeUploader {
        upload_calls: AtomicUsize,
    }

    #[async_trait]
    impl VideoPlatformUploader for FakeUploader {
        async fn get_or_create_playlist(&self, _name: &str, _desc: &str) -> PlatformResult<Option<String>> {
            Ok(Some("playlist-1".to_string()))
        }

        async fn upload_video(
            &self,
            _path: &Path,
            _title: &str,
            _description: &str,
            _privacy: &str,
            _playlist_id: Option<&str>,
        ) -> PlatformResult<Option<String>> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("video-1".to_string()))
        }
    }

    struct FakeNotifier {
        requests: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for FakeNotifier {
        async fn send(&self, _message: &str, _actions: &[NotificationAction]) -> PlatformResult<()> {
            Ok(())
        }

        async fn is_waiting_for_input(&self, _group_dir: &Path) -> bool {
            false
        }

        async fn request_playlist_name(&self, _group_dir: &Path, _team_name: &str) -> PlatformResult<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn write_match_info(group_dir: &Path, team: &str) {
        let info = MatchInfo {
            my_team_name: Some(team.to_string()),
            opponent_team_name: Some("Rays".to_string()),
            location: Some("Field 3".to_string()),
            start_time_offset: Some("00:05:00".to_string()),
            end_time_offset: Some("01:35:00".to_string()),
            total_duration: None,
        };
        info.save(group_dir.join("match_info.ini")).unwrap();
    }

    #[tokio::test]
    async fn unknown_team_requests_playlist_name_and_does_not_upload() {
        let dir = tempdir().unwrap();
        write_match_info(dir.path(), "Sharks");

        let uploader = Arc::new(FakeUploader {
            upload_calls: AtomicUsize::new(0),
        });
        let notifier = Arc::new(FakeNotifier {
            requests: AtomicUsize::new(0),
        });
        let processor = UploadProcessor::new(
            uploader.clone(),
            notifier.clone(),
            PlaylistMap::default(),
            "unlisted",
            || true,
        );

        processor
            .handle(YoutubeUploadTask {
                group_dir: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        assert_eq!(notifier.requests.load(Ordering::SeqCst), 1);
        assert_eq!(uploader.upload_calls.load(Ordering::SeqCst), 0);
        let state = DirectoryState::new(dir.path());
        assert_eq!(state.read().await.unwrap().status, GroupStatus::Pending);
    }

    #[tokio::test]
    async fn missing_credentials_drops_task_without_state_change() {
        let dir = tempdir().unwrap();
        write_match_info(dir.path(), "Sharks");

        let uploader = Arc::new(FakeUploader {
            upload_calls: AtomicUsize::new(0),
        });
        let notifier = Arc::new(FakeNotifier {
            requests: AtomicUsize::new(0),
        });
        let mut map = HashMap::new();
        map.insert("Sharks".to_string(), "Sharks 2024".to_string());
        let processor = UploadProcessor::new(uploader, notifier, PlaylistMap::new(map), "unlisted", || false);

        processor
            .handle(YoutubeUploadTask {
                group_dir: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        let state = DirectoryState::new(dir.path());
        assert_eq!(state.read().await.unwrap().status, GroupStatus::Pending);
    }

    #[tokio::test]
    async fn known_team_with_raw_output_uploads_and_marks_complete() {
        let dir = tempdir().unwrap();
        write_match_info(dir.path(), "Sharks");
        let subdir = dir.path().join("2024.01.01 - Sharks vs Rays (Field 3)");
        std::fs::create_dir_all(&subdir).unwrap();
        std::fs::write(subdir.join("sharks-rays-field3-01-01-2024-raw.mp4"), b"raw").unwrap();

        let uploader = Arc::new(FakeUploader {
            upload_calls: AtomicUsize::new(0),
        });
        let notifier = Arc::new(FakeNotifier {
            requests: AtomicUsize::new(0),
        });
        let mut map = HashMap::new();
        map.insert("Sharks".to_string(), "Sharks 2024".to_string());
        let processor = UploadProcessor::new(uploader.clone(), notifier, PlaylistMap::new(map), "unlisted", || true);

        processor
            .handle(YoutubeUploadTask {
                group_dir: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        assert_eq!(uploader.upload_calls.load(Ordering::SeqCst), 1);
        let state = DirectoryState::new(dir.path());
        assert_eq!(state.read().await.unwrap().status, GroupStatus::YoutubeUploaded);
    }

    #[tokio::test]
    async fn playlist_name_answered_via_ntfy_completes_the_round_trip() {
        let dir = tempdir().unwrap();
        write_match_info(dir.path(), "Sharks");
        let subdir = dir.path().join("2024.01.01 - Sharks vs Rays (Field 3)");
        std::fs::create_dir_all(&subdir).unwrap();
        std::fs::write(subdir.join("sharks-rays-field3-01-01-2024-raw.mp4"), b"raw").unwrap();

        // No entry for "Sharks" in the static map — this mirrors the state
        // a human's NTFY reply would have already written to state.json.
        let state = DirectoryState::new(dir.path());
        state.set_playlist_name("Sharks 2024").await.unwrap();

        let uploader = Arc::new(FakeUploader {
            upload_calls: AtomicUsize::new(0),
        });
        let notifier = Arc::new(FakeNotifier {
            requests: AtomicUsize::new(0),
        });
        let processor = UploadProcessor::new(
            uploader.clone(),
            notifier.clone(),
            PlaylistMap::default(),
            "unlisted",
            || true,
        );

        processor
            .handle(YoutubeUploadTask {
                group_dir: dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        assert_eq!(notifier.requests.load(Ordering::SeqCst), 0);
        assert_eq!(uploader.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.read().await.unwrap().status, GroupStatus::YoutubeUploaded);
    }
}
