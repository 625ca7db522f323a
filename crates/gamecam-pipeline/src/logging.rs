//! Structured stage/group logging utilities.
//!
//! Every task worker logs with the group directory and task key attached so
//! log lines are the primary user-facing visibility the spec grants failures
//! (§7 "Visible failure behavior").

use std::path::Path;

use tracing::{error, info, warn, Span};

/// Logger for one stage's handling of one task, carrying the group/task-key
/// context through every log line it emits.
#[derive(Debug, Clone)]
pub struct StageLogger {
    stage: &'static str,
    task_key: String,
}

impl StageLogger {
    pub fn new(stage: &'static str, task_key: impl Into<String>) -> Self {
        Self {
            stage,
            task_key: task_key.into(),
        }
    }

    pub fn started(&self, message: &str) {
        info!(stage = self.stage, task_key = %self.task_key, "{}", message);
    }

    pub fn succeeded(&self, message: &str) {
        info!(stage = self.stage, task_key = %self.task_key, "{}", message);
    }

    pub fn warned(&self, message: &str) {
        warn!(stage = self.stage, task_key = %self.task_key, "{}", message);
    }

    pub fn failed(&self, message: &str) {
        error!(stage = self.stage, task_key = %self.task_key, "{}", message);
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("task", stage = self.stage, task_key = %self.task_key)
    }
}

/// Shorthand for constructing a [`StageLogger`] keyed by a group directory.
pub fn group_logger(stage: &'static str, group_dir: &Path) -> StageLogger {
    StageLogger::new(stage, group_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn group_logger_uses_display_path_as_key() {
        let logger = group_logger("video", &PathBuf::from("/storage/2024.01.01-10.00.00"));
        assert_eq!(logger.task_key, "/storage/2024.01.01-10.00.00");
    }
}
