//! Dahua NVR/DVR camera collaborator.
//!
//! Dahua's `cgi-bin` surface is authenticated with HTTP Digest. We hand-roll
//! the digest handshake with `digest_auth` rather than relying on reqwest's
//! (nonexistent) built-in digest support: issue the request once to harvest
//! the `WWW-Authenticate` challenge, then resend with an `Authorization`
//! header computed from it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::camera::{Camera, RemoteRecording};
use crate::error::{CameraError, CameraResult};

/// Connection details for one Dahua device.
#[derive(Debug, Clone)]
pub struct DahuaConfig {
    pub ip: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl DahuaConfig {
    pub fn new(ip: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.ip)
    }
}

pub struct DahuaCamera {
    config: DahuaConfig,
    client: Client,
}

impl DahuaCamera {
    pub fn new(config: DahuaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client build");
        Self { config, client }
    }

    /// Issue a digest-authenticated GET. Dahua's `cgi-bin` endpoints
    /// challenge with 401 on the first (anonymous) request.
    async fn digest_get(&self, path: &str) -> CameraResult<reqwest::Response> {
        let url = format!("{}{}", self.config.base_url(), path);

        let probe = self.client.get(&url).send().await?;
        if probe.status() != StatusCode::UNAUTHORIZED {
            return Ok(probe);
        }

        let www_auth = probe
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CameraError::Protocol("missing WWW-Authenticate header".into()))?;

        let mut prompt = digest_auth::parse(www_auth)
            .map_err(|e| CameraError::Protocol(format!("bad digest challenge: {e}")))?;
        let context = digest_auth::AuthContext::new(&self.config.username, &self.config.password, path);
        let answer = prompt
            .respond(&context)
            .map_err(|e| CameraError::Protocol(format!("digest response failed: {e}")))?
            .to_header_string();

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, answer)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(CameraError::AuthFailed);
        }

        Ok(response)
    }

    /// Query `mediaFileFind` for recordings ending after `since` and no
    /// later than `until`, returning raw `key=value` lines the way Dahua's
    /// CGI responds.
    async fn find_media(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> CameraResult<String> {
        let path = "/cgi-bin/mediaFileFind.cgi?action=factory.create".to_string();
        let create = self.digest_get(&path).await?;
        let body = create.text().await?;
        let object = body
            .lines()
            .find_map(|line| line.strip_prefix("result="))
            .ok_or_else(|| CameraError::Protocol("mediaFileFind.create returned no object id".into()))?;

        let find_path = format!(
            "/cgi-bin/mediaFileFind.cgi?action=findFile&object={object}&condition.Channel=1&condition.StartTime={}&condition.EndTime={}&condition.Types[0]=dav",
            since.format("%Y-%m-%d%%20%H:%M:%S"),
            until.format("%Y-%m-%d%%20%H:%M:%S"),
        );
        let find = self.digest_get(&find_path).await?;
        if !find.status().is_success() {
            return Err(CameraError::Protocol(format!(
                "mediaFileFind.findFile returned {}",
                find.status()
            )));
        }
        find.text().await.map_err(CameraError::from)
    }
}

#[async_trait]
impl Camera for DahuaCamera {
    async fn check_availability(&self) -> bool {
        match self.digest_get("/cgi-bin/magicBox.cgi?action=getSystemInfo").await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "dahua availability check failed");
                false
            }
        }
    }

    async fn list_recordings(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CameraResult<Vec<RemoteRecording>> {
        let body = self.find_media(since, until).await?;
        Ok(parse_find_file_response(&body)
            .into_iter()
            .filter(|r| r.end > since && r.end <= until)
            .collect())
    }

    async fn download_file(&self, remote_path: &str, local_path: &Path) -> CameraResult<u64> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path = format!("/cgi-bin/RPC_Loadfile/{remote_path}");
        let response = self.digest_get(&path).await?;
        if !response.status().is_success() {
            return Err(CameraError::Protocol(format!(
                "download returned {}",
                response.status()
            )));
        }

        let expected_len = response.content_length();

        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected_len {
            if expected != written {
                warn!(expected, written, "content-length mismatch on download");
                return Err(CameraError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        Ok(written)
    }
}

/// Parse Dahua's `items[n].*` line-oriented `findFile` response into
/// structured recordings.
fn parse_find_file_response(body: &str) -> Vec<RemoteRecording> {
    use std::collections::BTreeMap;

    let mut by_index: BTreeMap<usize, BTreeMap<&str, &str>> = BTreeMap::new();

    for line in body.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some(rest) = key.strip_prefix("items[") else {
            continue;
        };
        let Some((idx_str, field)) = rest.split_once("].") else {
            continue;
        };
        let Ok(idx) = idx_str.parse::<usize>() else {
            continue;
        };
        by_index.entry(idx).or_default().insert(field, value);
    }

    by_index
        .into_values()
        .filter_map(|fields| {
            let remote_path = (*fields.get("FilePath")?).to_string();
            let start = parse_dahua_time(fields.get("StartTime")?)?;
            let end = parse_dahua_time(fields.get("EndTime")?)?;
            let size = fields.get("Length").and_then(|s| s.parse().ok()).unwrap_or(0);
            Some(RemoteRecording {
                remote_path,
                start,
                end,
                size,
            })
        })
        .collect()
}

fn parse_dahua_time(s: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(mock_server: &MockServer) -> DahuaConfig {
        let ip = mock_server
            .uri()
            .strip_prefix("http://")
            .unwrap()
            .to_string();
        DahuaConfig::new(ip, "admin", "secret")
    }

    #[tokio::test]
    async fn availability_check_succeeds_without_a_digest_challenge() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/magicBox.cgi"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let camera = DahuaCamera::new(config_for(&mock_server));
        assert!(camera.check_availability().await);
    }

    #[tokio::test]
    async fn availability_check_fails_on_unreachable_host() {
        let camera = DahuaCamera::new(DahuaConfig::new("127.0.0.1:1", "admin", "secret"));
        assert!(!camera.check_availability().await);
    }

    #[test]
    fn parses_find_file_items() {
        let body = "items[0].FilePath=/mnt/dvr/01/2024-01-01/001.dav\n\
                     items[0].StartTime=2024-01-01 10:00:00\n\
                     items[0].EndTime=2024-01-01 10:15:00\n\
                     items[0].Length=104857600\n\
                     items[1].FilePath=/mnt/dvr/01/2024-01-01/002.dav\n\
                     items[1].StartTime=2024-01-01 10:15:03\n\
                     items[1].EndTime=2024-01-01 10:30:00\n\
                     items[1].Length=104857600\n";

        let recordings = parse_find_file_response(body);
        assert_eq!(recordings.len(), 2);
        assert_eq!(recordings[0].remote_path, "/mnt/dvr/01/2024-01-01/001.dav");
        assert_eq!(recordings[0].size, 104_857_600);
        assert!(recordings[1].start > recordings[0].end);
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let recordings = parse_find_file_response("garbage\nno_equals_sign");
        assert!(recordings.is_empty());
    }

    #[tokio::test]
    async fn download_file_streams_to_disk_and_matches_content_length() {
        let mock_server = MockServer::start().await;
        let payload = vec![7u8; 256 * 1024];
        Mock::given(method("GET"))
            .and(path("/cgi-bin/RPC_Loadfile/01/2024-01-01/001.dav"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .mount(&mock_server)
            .await;

        let camera = DahuaCamera::new(config_for(&mock_server));
        let dir = tempfile::tempdir().unwrap();
        let local_path = dir.path().join("group").join("001.dav");

        let written = camera
            .download_file("01/2024-01-01/001.dav", &local_path)
            .await
            .unwrap();

        assert_eq!(written, payload.len() as u64);
        let on_disk = tokio::fs::read(&local_path).await.unwrap();
        assert_eq!(on_disk, payload);
    }
}
