//! Video Processor (§4.4): Convert, Combine and Trim, driven against the
//! `ffmpeg`/`ffprobe` collaborator in `gamecam-media`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use gamecam_media::{combine, convert, trim, trim_output_is_valid, verify_mp4_duration};
use gamecam_models::{
    group_dir_name, CombineTask, ConvertTask, FileStatus, GroupStatus, MatchInfo,
    TrimTask, UploadQueueTask, VideoTask, YoutubeUploadTask,
};
use gamecam_queue::{QueueProcessor, StageWorker};
use gamecam_state::DirectoryState;

use crate::logging::StageLogger;

/// Drives Convert/Combine/Trim for one group at a time, advancing
/// `state.json` and emitting the next stage's task on success.
pub struct VideoProcessor {
    video_queue: Arc<QueueProcessor<VideoTask>>,
    upload_queue: Arc<QueueProcessor<UploadQueueTask>>,
}

impl VideoProcessor {
    pub fn new(
        video_queue: Arc<QueueProcessor<VideoTask>>,
        upload_queue: Arc<QueueProcessor<UploadQueueTask>>,
    ) -> Self {
        Self {
            video_queue,
            upload_queue,
        }
    }

    async fn handle_convert(&self, task: ConvertTask) -> anyhow::Result<()> {
        let logger = StageLogger::new("video.convert", task.task_key());
        let group_dir = task
            .file_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("{} has no parent", task.file_path.display()))?
            .to_path_buf();
        let state = DirectoryState::new(&group_dir);
        let mp4_path = task.file_path.with_extension("mp4");

        logger.started("transcoding segment");
        match convert(&task.file_path, &mp4_path).await {
            Ok(()) => match verify_mp4_duration(&task.file_path, &mp4_path).await {
                Ok(()) => {
                    let doc = state
                        .update_file_state(&task.file_path, FileStatus::Converted)
                        .await?;
                    logger.succeeded("segment converted");

                    if DirectoryState::all_active_files_at_least(&doc, FileStatus::Converted)
                        && doc.status != GroupStatus::Combined
                    {
                        self.video_queue
                            .add_work(VideoTask::Combine(CombineTask {
                                group_dir: group_dir.clone(),
                            }))
                            .await?;
                    }
                }
                Err(e) => {
                    state
                        .mark_file_failed(&task.file_path, FileStatus::ConvertFailed, e.to_string())
                        .await?;
                    logger.failed(&format!("duration verification failed: {e}"));
                }
            },
            Err(e) => {
                state
                    .mark_file_failed(&task.file_path, FileStatus::ConvertFailed, e.to_string())
                    .await?;
                logger.failed(&format!("transcode failed: {e}"));
            }
        }
        Ok(())
    }

    async fn handle_combine(&self, task: CombineTask) -> anyhow::Result<()> {
        let logger = StageLogger::new("video.combine", task.task_key());
        let state = DirectoryState::new(&task.group_dir);
        let doc = state.read().await?;

        if !DirectoryState::all_active_files_at_least(&doc, FileStatus::Converted) {
            logger.warned("not every active file is converted yet, skipping");
            return Ok(());
        }

        logger.started("combining segments");
        match combine(&task.group_dir).await {
            Ok(_combined_path) => {
                state.set_group_status(GroupStatus::Combined).await?;
                logger.succeeded("group combined");

                let match_info = MatchInfo::load(task.group_dir.join("match_info.ini"))?;
                if let Some((start, end)) = match_info.trim_window_secs()? {
                    self.video_queue
                        .add_work(VideoTask::Trim(TrimTask {
                            group_dir: task.group_dir.clone(),
                            start_offset_secs: start,
                            end_offset_secs: end,
                        }))
                        .await?;
                } else {
                    logger.warned("match_info not ready, leaving for the auditor");
                }
            }
            Err(e) => {
                logger.failed(&format!("combine failed: {e}"));
            }
        }
        Ok(())
    }

    async fn handle_trim(&self, task: TrimTask) -> anyhow::Result<()> {
        let logger = StageLogger::new("video.trim", task.task_key());
        let combined_path = task.group_dir.join("combined.mp4");
        let output_path = trim_output_path(&task.group_dir)?;

        if trim_output_is_valid(&output_path, task.start_offset_secs, task.end_offset_secs).await {
            logger.succeeded("trim output already valid, skipping");
            let state = DirectoryState::new(&task.group_dir);
            state.set_group_status(GroupStatus::Trimmed).await?;
            self.upload_queue
                .add_work(UploadQueueTask::YoutubeUpload(YoutubeUploadTask {
                    group_dir: task.group_dir.clone(),
                }))
                .await?;
            return Ok(());
        }

        logger.started("trimming combined artifact");
        match trim(
            &combined_path,
            &output_path,
            task.start_offset_secs,
            task.end_offset_secs,
        )
        .await
        {
            Ok(()) => {
                let state = DirectoryState::new(&task.group_dir);
                state.set_group_status(GroupStatus::Trimmed).await?;
                logger.succeeded("group trimmed");

                self.upload_queue
                    .add_work(UploadQueueTask::YoutubeUpload(YoutubeUploadTask {
                        group_dir: task.group_dir.clone(),
                    }))
                    .await?;
            }
            Err(e) => {
                logger.failed(&format!("trim failed: {e}"));
            }
        }
        Ok(())
    }
}

/// `group_dir/<YYYY.MM.DD - MyTeam vs Opp (loc)>/<myteam-opp-loc-MM-DD-YYYY-raw.mp4>`
/// (§4.4, §6).
fn trim_output_path(group_dir: &Path) -> anyhow::Result<PathBuf> {
    let match_info = MatchInfo::load(group_dir.join("match_info.ini"))?;
    match_info
        .trim_output_path(group_dir)
        .ok_or_else(|| anyhow::anyhow!("{} is not a recognised group directory name", group_dir.display()))
}

#[async_trait]
impl StageWorker<VideoTask> for VideoProcessor {
    async fn process_item(&self, item: VideoTask) -> anyhow::Result<()> {
        match item {
            VideoTask::Convert(task) => self.handle_convert(task).await,
            VideoTask::Combine(task) => self.handle_combine(task).await,
            VideoTask::Trim(task) => self.handle_trim(task).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_output_path_uses_group_date_and_slugged_teams() {
        let dir = tempfile::tempdir().unwrap();
        let group_dir = dir.path().join(group_dir_name(
            chrono::Utc::now()
                .date_naive()
                .and_hms_opt(10, 0, 0)
                .unwrap()
                .and_utc(),
        ));
        std::fs::create_dir_all(&group_dir).unwrap();
        let info = MatchInfo {
            my_team_name: Some("My Team".into()),
            opponent_team_name: Some("The Opp".into()),
            location: Some("Field 3".into()),
            start_time_offset: Some("00:05:00".into()),
            end_time_offset: Some("01:35:00".into()),
            total_duration: None,
        };
        info.save(group_dir.join("match_info.ini")).unwrap();

        let path = trim_output_path(&group_dir).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("myteam-theopp-field3-"));
        assert!(path.to_str().unwrap().contains("My Team vs The Opp (Field 3)"));
    }
}
