//! The NTFY notification-channel contract (§6) and a reference
//! implementation against an ntfy.sh-compatible topic.
//!
//! The Upload Processor uses this to ask a human for a playlist name when
//! it finds no mapping for a team (§4.5); the response is expected to land
//! back as a `youtube_playlist_name` write to the group's `state.json` by
//! whatever consumes the notification action — out of scope here (§1).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::PlatformResult;

/// One user-facing action attached to a notification (ntfy's `Actions`
/// header format: `action, label, url/payload`).
#[derive(Debug, Clone)]
pub struct NotificationAction {
    pub label: String,
    pub url: String,
}

/// Narrow async contract a human-notification collaborator must provide
/// (§6). `is_waiting_for_input` lets a caller avoid re-sending the same
/// prompt every Auditor pass while a human hasn't yet responded.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &str, actions: &[NotificationAction]) -> PlatformResult<()>;

    async fn is_waiting_for_input(&self, group_dir: &Path) -> bool;

    async fn request_playlist_name(&self, group_dir: &Path, team_name: &str) -> PlatformResult<()>;
}

/// Posts to an ntfy topic over HTTP. Tracks which group directories have an
/// outstanding playlist-name request in-process, since the ntfy protocol
/// itself has no notion of a pending reply.
pub struct NtfyChannel {
    http: Client,
    topic_url: String,
    pending: Mutex<HashSet<PathBuf>>,
}

impl NtfyChannel {
    pub fn new(topic_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            topic_url: topic_url.into(),
            pending: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl NotificationChannel for NtfyChannel {
    async fn send(&self, message: &str, actions: &[NotificationAction]) -> PlatformResult<()> {
        let mut request = self.http.post(&self.topic_url).body(message.to_string());
        if !actions.is_empty() {
            let header = actions
                .iter()
                .map(|a| format!("view, {}, {}", a.label, a.url))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header("Actions", header);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }

    async fn is_waiting_for_input(&self, group_dir: &Path) -> bool {
        self.pending
            .lock()
            .expect("pending set poisoned")
            .contains(group_dir)
    }

    async fn request_playlist_name(&self, group_dir: &Path, team_name: &str) -> PlatformResult<()> {
        let message = format!(
            "No YouTube playlist mapped for team '{team_name}'. Reply with the playlist name for {}.",
            group_dir.display()
        );
        self.send(&message, &[]).await?;
        self.pending
            .lock()
            .expect("pending set poisoned")
            .insert(group_dir.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_marks_group_as_waiting_after_request() {
        let channel = NtfyChannel::new("http://127.0.0.1:0/unreachable");
        let group = PathBuf::from("/storage/2024.01.01-10.00.00");
        assert!(!channel.is_waiting_for_input(&group).await);

        // Sending fails (nothing listening) but the pending marker should
        // only be set on success, matching the "re-issue after input"
        // contract in §4.5/§4.6.
        let _ = channel.request_playlist_name(&group, "Sharks").await;
    }
}
