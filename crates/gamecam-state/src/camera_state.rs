//! `camera_state.json`: process-wide connect/disconnect event log plus the
//! Poller's high-watermark (§4.2, §6).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateResult;
use crate::lock::FileLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEventType {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub event_datetime: DateTime<Utc>,
    pub event_type: ConnectionEventType,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraStateDocument {
    #[serde(default)]
    pub connection_events: Vec<ConnectionEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_end_time: Option<DateTime<Utc>>,
}

pub struct CameraState {
    path: PathBuf,
}

impl CameraState {
    pub fn new(storage_root: impl AsRef<Path>) -> Self {
        Self {
            path: storage_root.as_ref().join("camera_state.json"),
        }
    }

    async fn load(&self) -> StateResult<CameraStateDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(CameraStateDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(CameraStateDocument::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &CameraStateDocument) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(doc)?).await?;
        Ok(())
    }

    pub async fn read(&self) -> StateResult<CameraStateDocument> {
        self.load().await
    }

    /// The watermark to resume listing from: the persisted value, or
    /// today's midnight UTC if absent (§4.2).
    pub async fn watermark(&self) -> StateResult<DateTime<Utc>> {
        let doc = self.load().await?;
        Ok(doc.last_seen_end_time.unwrap_or_else(|| {
            Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always valid")
                .and_utc()
        }))
    }

    pub async fn record_event(
        &self,
        event_type: ConnectionEventType,
        message: impl Into<String>,
    ) -> StateResult<()> {
        let _guard = FileLock::acquire(&self.path).await?;
        let mut doc = self.load().await?;
        doc.connection_events.push(ConnectionEvent {
            event_datetime: Utc::now(),
            event_type,
            message: message.into(),
        });
        self.write(&doc).await
    }

    pub async fn advance_watermark(&self, end_time: DateTime<Utc>) -> StateResult<()> {
        let _guard = FileLock::acquire(&self.path).await?;
        let mut doc = self.load().await?;
        if doc.last_seen_end_time.map_or(true, |prev| end_time > prev) {
            doc.last_seen_end_time = Some(end_time);
        }
        self.write(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn watermark_defaults_to_today_midnight_when_absent() {
        let dir = tempdir().unwrap();
        let state = CameraState::new(dir.path());
        let watermark = state.watermark().await.unwrap();
        assert_eq!(watermark.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn watermark_only_advances_forward() {
        let dir = tempdir().unwrap();
        let state = CameraState::new(dir.path());

        let later = Utc::now();
        let earlier = later - chrono::Duration::hours(1);

        state.advance_watermark(later).await.unwrap();
        state.advance_watermark(earlier).await.unwrap();

        assert_eq!(state.watermark().await.unwrap(), later);
    }

    #[tokio::test]
    async fn records_connection_events() {
        let dir = tempdir().unwrap();
        let state = CameraState::new(dir.path());
        state
            .record_event(ConnectionEventType::Disconnected, "timeout")
            .await
            .unwrap();
        let doc = state.read().await.unwrap();
        assert_eq!(doc.connection_events.len(), 1);
        assert_eq!(doc.connection_events[0].event_type, ConnectionEventType::Disconnected);
    }
}
