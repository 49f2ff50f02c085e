//! Lifecycle status of a broadcast on the video-hosting service.

use crate::config::YouTubeConfig;
use crate::error::{CastkeeperError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Unknown,
    Upcoming,
    Live,
    Ended,
}

impl LifecycleStatus {
    /// Map the API's `lifeCycleStatus` string.
    pub fn from_api(raw: &str) -> Self {
        match raw {
            "live" => LifecycleStatus::Live,
            "complete" | "revoked" => LifecycleStatus::Ended,
            "created" | "ready" | "testing" | "testStarting" | "liveStarting" => {
                LifecycleStatus::Upcoming
            }
            _ => LifecycleStatus::Unknown,
        }
    }

    /// A status that positively says "not live" (as opposed to "could not tell").
    pub fn is_definitive_not_live(self) -> bool {
        matches!(self, LifecycleStatus::Upcoming | LifecycleStatus::Ended)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleStatus::Unknown => "unknown",
            LifecycleStatus::Upcoming => "upcoming",
            LifecycleStatus::Live => "live",
            LifecycleStatus::Ended => "ended",
        })
    }
}

pub trait LifecycleStatusSource: Send + Sync {
    /// Never fails: anything that prevents an answer is `Unknown`.
    fn lifecycle_status(&self, broadcast_id: &str) -> LifecycleStatus;
}

/// Used when no token file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatusSource;

impl LifecycleStatusSource for NoStatusSource {
    fn lifecycle_status(&self, _broadcast_id: &str) -> LifecycleStatus {
        LifecycleStatus::Unknown
    }
}

// ---------------------------------------------------------------------------
// Token file
// ---------------------------------------------------------------------------

/// Authorized-user credentials as written by the OAuth consent helper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn usable(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map_or(true, |at| at - now > Duration::seconds(60))
    }
}

#[derive(Deserialize)]
struct BroadcastList {
    #[serde(default)]
    items: Vec<BroadcastItem>,
}

#[derive(Deserialize)]
struct BroadcastItem {
    status: BroadcastStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastStatus {
    #[serde(default)]
    life_cycle_status: String,
}

// ---------------------------------------------------------------------------
// YouTubeStatusClient
// ---------------------------------------------------------------------------

pub struct YouTubeStatusClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token_endpoint: String,
    token_file: PathBuf,
    cached: Mutex<Option<AccessToken>>,
}

impl YouTubeStatusClient {
    pub fn new(config: &YouTubeConfig, token_file: PathBuf) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token_endpoint: config.token_endpoint.clone(),
            token_file,
            cached: Mutex::new(None),
        })
    }

    fn bearer(&self, force_refresh: bool) -> Result<String> {
        let now = Utc::now();
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if !force_refresh {
            if let Some(token) = cached.as_ref().filter(|t| t.usable(now)) {
                return Ok(token.value.clone());
            }
        }

        let data = std::fs::read_to_string(&self.token_file)?;
        let mut file: TokenFile = serde_json::from_str(&data)?;
        let on_disk = file.token.clone().map(|value| AccessToken {
            value,
            expires_at: file.expiry,
        });
        if !force_refresh {
            if let Some(token) = on_disk.as_ref().filter(|t| t.usable(now)) {
                *cached = Some(token.clone());
                return Ok(token.value.clone());
            }
        }

        let token = match self.refresh(&file)? {
            Some(fresh) => {
                file.token = Some(fresh.value.clone());
                file.expiry = fresh.expires_at;
                let data = serde_json::to_vec_pretty(&file)?;
                if let Err(e) = crate::io::atomic_write(&self.token_file, &data) {
                    tracing::warn!(error = %e, "could not persist refreshed token");
                }
                tracing::info!("access token refreshed");
                fresh
            }
            // No way to refresh: try the stored token and let the API decide.
            None => on_disk.ok_or_else(|| {
                CastkeeperError::Http("token file holds neither token nor refresh_token".into())
            })?,
        };
        *cached = Some(token.clone());
        Ok(token.value)
    }

    fn refresh(&self, file: &TokenFile) -> Result<Option<AccessToken>> {
        let Some(refresh_token) = file.refresh_token.as_deref() else {
            return Ok(None);
        };
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", file.client_id.as_deref().unwrap_or_default()),
            ("client_secret", file.client_secret.as_deref().unwrap_or_default()),
        ];
        let resp = self.http.post(&self.token_endpoint).form(&form).send()?;
        if !resp.status().is_success() {
            return Err(CastkeeperError::Http(format!(
                "token refresh rejected: {}",
                resp.status()
            )));
        }
        let body: RefreshResponse = resp.json()?;
        Ok(Some(AccessToken {
            value: body.access_token,
            expires_at: body.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        }))
    }

    fn fetch(&self, broadcast_id: &str) -> Result<LifecycleStatus> {
        let url = format!("{}/liveBroadcasts", self.api_base);
        let mut refreshed = false;
        loop {
            let bearer = self.bearer(refreshed)?;
            let resp = self
                .http
                .get(&url)
                .query(&[("part", "status"), ("id", broadcast_id)])
                .bearer_auth(bearer)
                .send()?;
            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                refreshed = true;
                continue;
            }
            if !status.is_success() {
                return Err(CastkeeperError::Http(format!("liveBroadcasts: {status}")));
            }
            let list: BroadcastList = resp.json()?;
            return Ok(list
                .items
                .first()
                .map(|item| LifecycleStatus::from_api(&item.status.life_cycle_status))
                .unwrap_or(LifecycleStatus::Unknown));
        }
    }
}

impl LifecycleStatusSource for YouTubeStatusClient {
    fn lifecycle_status(&self, broadcast_id: &str) -> LifecycleStatus {
        match self.fetch(broadcast_id) {
            Ok(status) => {
                tracing::debug!(broadcast_id, %status, "lifecycle status");
                status
            }
            Err(e) => {
                tracing::warn!(broadcast_id, error = %e, "lifecycle status unavailable");
                LifecycleStatus::Unknown
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tempfile::TempDir;

    fn setup(server: &mockito::ServerGuard, token_json: &str) -> (TempDir, YouTubeStatusClient) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, token_json).unwrap();
        let config = YouTubeConfig {
            token_file: Some(path.clone()),
            api_base: server.url(),
            token_endpoint: format!("{}/token", server.url()),
            timeout_seconds: 5,
        };
        let client = YouTubeStatusClient::new(&config, path).unwrap();
        (dir, client)
    }

    fn status_body(lifecycle: &str) -> String {
        format!(r#"{{"items":[{{"id":"abc","status":{{"lifeCycleStatus":"{lifecycle}"}}}}]}}"#)
    }

    #[test]
    fn maps_api_strings() {
        assert_eq!(LifecycleStatus::from_api("live"), LifecycleStatus::Live);
        assert_eq!(LifecycleStatus::from_api("complete"), LifecycleStatus::Ended);
        assert_eq!(LifecycleStatus::from_api("revoked"), LifecycleStatus::Ended);
        assert_eq!(LifecycleStatus::from_api("testStarting"), LifecycleStatus::Upcoming);
        assert_eq!(LifecycleStatus::from_api("ready"), LifecycleStatus::Upcoming);
        assert_eq!(LifecycleStatus::from_api("weird"), LifecycleStatus::Unknown);
        assert!(!LifecycleStatus::Unknown.is_definitive_not_live());
        assert!(LifecycleStatus::Ended.is_definitive_not_live());
    }

    #[test]
    fn queries_status_with_stored_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/liveBroadcasts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("part".into(), "status".into()),
                Matcher::UrlEncoded("id".into(), "abc".into()),
            ]))
            .match_header("authorization", "Bearer stored")
            .with_status(200)
            .with_body(status_body("live"))
            .expect(1)
            .create();
        let (_dir, client) = setup(&server, r#"{"token": "stored", "expiry": "2999-01-01T00:00:00Z"}"#);

        assert_eq!(client.lifecycle_status("abc"), LifecycleStatus::Live);
        mock.assert();
    }

    #[test]
    fn expired_token_is_refreshed_and_persisted() {
        let mut server = mockito::Server::new();
        let refresh = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(200)
            .with_body(r#"{"access_token": "fresh", "expires_in": 3600}"#)
            .create();
        server
            .mock("GET", "/liveBroadcasts")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body(status_body("complete"))
            .create();
        let (dir, client) = setup(
            &server,
            r#"{"token": "old", "refresh_token": "r1", "client_id": "c", "client_secret": "s",
                "expiry": "2000-01-01T00:00:00Z", "scopes": ["youtube"]}"#,
        );

        assert_eq!(client.lifecycle_status("abc"), LifecycleStatus::Ended);
        refresh.assert();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("token.json")).unwrap())
                .unwrap();
        assert_eq!(saved["token"], "fresh");
        assert_eq!(saved["scopes"][0], "youtube");
    }

    #[test]
    fn empty_items_and_errors_are_unknown() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/liveBroadcasts")
            .match_query(Matcher::UrlEncoded("id".into(), "none".into()))
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create();
        server
            .mock("GET", "/liveBroadcasts")
            .match_query(Matcher::UrlEncoded("id".into(), "boom".into()))
            .with_status(500)
            .create();
        let (_dir, client) = setup(&server, r#"{"token": "t"}"#);

        assert_eq!(client.lifecycle_status("none"), LifecycleStatus::Unknown);
        assert_eq!(client.lifecycle_status("boom"), LifecycleStatus::Unknown);
    }

    #[test]
    fn missing_token_file_is_unknown() {
        let server = mockito::Server::new();
        let config = YouTubeConfig {
            api_base: server.url(),
            ..YouTubeConfig::default()
        };
        let client = YouTubeStatusClient::new(&config, "/nonexistent/token.json".into()).unwrap();
        assert_eq!(client.lifecycle_status("abc"), LifecycleStatus::Unknown);
    }
}
