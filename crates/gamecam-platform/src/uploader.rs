//! The video-platform uploader contract (§6) and its YouTube reference
//! implementation.
//!
//! The core only drives `get_or_create_playlist` / `upload_video`; it never
//! performs the OAuth dance itself (Non-goal, §1) — a refreshable
//! `token.json` is expected to already exist on disk (see
//! `YoutubeUploader::from_credentials`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PlatformError, PlatformResult};

/// Narrow async contract an upload destination must provide (§6).
#[async_trait]
pub trait VideoPlatformUploader: Send + Sync {
    /// Find an existing playlist named `name`, or create one with
    /// `description`. Returns `None` if the platform has no notion of
    /// playlists.
    async fn get_or_create_playlist(
        &self,
        name: &str,
        description: &str,
    ) -> PlatformResult<Option<String>>;

    /// Upload `path` with the given metadata, optionally adding it to
    /// `playlist_id`. Returns the platform's video id on success.
    async fn upload_video(
        &self,
        path: &Path,
        title: &str,
        description: &str,
        privacy: &str,
        playlist_id: Option<&str>,
    ) -> PlatformResult<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
}

/// YouTube Data API v3 uploader. Reads a bearer token from `token.json`;
/// refreshing that token is the responsibility of whatever produced it (the
/// excluded tray/OAuth collaborator, §1) — this client treats an expired
/// token as an upload failure, not something it refreshes itself.
pub struct YoutubeUploader {
    http: Client,
    token_file: PathBuf,
}

impl YoutubeUploader {
    const API_BASE: &'static str = "https://www.googleapis.com/youtube/v3";
    const UPLOAD_BASE: &'static str = "https://www.googleapis.com/upload/youtube/v3";

    pub fn from_credentials(token_file: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            token_file: token_file.into(),
        }
    }

    async fn bearer_token(&self) -> PlatformResult<String> {
        if !self.token_file.exists() {
            return Err(PlatformError::CredentialsMissing(
                self.token_file.display().to_string(),
            ));
        }
        let bytes = tokio::fs::read(&self.token_file).await?;
        let token: TokenFile = serde_json::from_slice(&bytes)?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl VideoPlatformUploader for YoutubeUploader {
    async fn get_or_create_playlist(
        &self,
        name: &str,
        description: &str,
    ) -> PlatformResult<Option<String>> {
        let token = self.bearer_token().await?;

        let existing = self
            .http
            .get(format!("{}/playlists", Self::API_BASE))
            .bearer_auth(&token)
            .query(&[("part", "snippet"), ("mine", "true"), ("maxResults", "50")])
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        if let Some(id) = existing["items"].as_array().and_then(|items| {
            items.iter().find(|item| {
                item["snippet"]["title"].as_str() == Some(name)
            })
        }).and_then(|item| item["id"].as_str()) {
            return Ok(Some(id.to_string()));
        }

        debug!(playlist = name, "creating new youtube playlist");
        let body = serde_json::json!({
            "snippet": { "title": name, "description": description },
            "status": { "privacyStatus": "unlisted" },
        });
        let created = self
            .http
            .post(format!("{}/playlists", Self::API_BASE))
            .bearer_auth(&token)
            .query(&[("part", "snippet,status")])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        Ok(created["id"].as_str().map(str::to_string))
    }

    async fn upload_video(
        &self,
        path: &Path,
        title: &str,
        description: &str,
        privacy: &str,
        playlist_id: Option<&str>,
    ) -> PlatformResult<Option<String>> {
        if !path.exists() {
            return Err(PlatformError::CredentialsMissing(format!(
                "video file not found: {}",
                path.display()
            )));
        }
        let token = self.bearer_token().await?;
        let bytes = tokio::fs::read(path).await?;

        let metadata = serde_json::json!({
            "snippet": { "title": title, "description": description },
            "status": { "privacyStatus": privacy },
        });

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .expect("static mime"),
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(bytes).mime_str("video/mp4").expect("static mime"),
            );

        let response = self
            .http
            .post(format!("{}/videos?uploadType=multipart&part=snippet,status", Self::UPLOAD_BASE))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Response(format!("{status}: {body}")));
        }

        let video: serde_json::Value = response.json().await?;
        let video_id = video["id"].as_str().map(str::to_string);

        if let (Some(id), Some(playlist)) = (video_id.as_deref(), playlist_id) {
            if let Err(e) = self.add_to_playlist(&token, playlist, id).await {
                warn!(video_id = id, playlist, error = %e, "uploaded video but failed to add it to playlist");
            }
        }

        Ok(video_id)
    }
}

impl YoutubeUploader {
    async fn add_to_playlist(&self, token: &str, playlist_id: &str, video_id: &str) -> PlatformResult<()> {
        let body = serde_json::json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            }
        });
        self.http
            .post(format!("{}/playlistItems", Self::API_BASE))
            .bearer_auth(token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
