//! [`QueueTask`] implementations for each stage's task-variant enum.
//!
//! These live here rather than on `gamecam-models` because `QueueTask` is
//! local to this crate — implementing it here keeps `gamecam-models` free of
//! a dependency on the queue machinery while still satisfying the orphan
//! rule (the trait, not the type, is what has to be local).

use gamecam_models::{DownloadQueueTask, UploadQueueTask, VideoTask};

use crate::queue::QueueTask;

impl QueueTask for DownloadQueueTask {
    fn task_key(&self) -> String {
        DownloadQueueTask::task_key(self)
    }
}

impl QueueTask for VideoTask {
    fn task_key(&self) -> String {
        VideoTask::task_key(self)
    }
}

impl QueueTask for UploadQueueTask {
    fn task_key(&self) -> String {
        UploadQueueTask::task_key(self)
    }
}
