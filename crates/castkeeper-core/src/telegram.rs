//! Telegram Bot API: `sendMessage` for notifications, `getUpdates` for the
//! manual `#on` / `#off` remote signal.

use crate::config::TelegramConfig;
use crate::error::{CastkeeperError, Result};
use crate::notify::{Notifier, RemoteSignal, RemoteSignalSource};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize)]
struct Credentials {
    token: String,
    chat_id: Value,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Deserialize)]
struct Update {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: Value,
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct TelegramClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// `None` when neither inline credentials nor a credentials file are set.
    pub fn from_config(config: &TelegramConfig, root: &Path) -> Result<Option<Self>> {
        let (token, chat_id) = match (&config.token, &config.chat_id, &config.credentials_file) {
            (Some(token), Some(chat_id), _) => (token.clone(), chat_id.clone()),
            (_, _, Some(file)) => {
                let path = crate::paths::resolve(root, file);
                let data = std::fs::read_to_string(&path).map_err(|e| {
                    CastkeeperError::InvalidConfig(format!(
                        "telegram.credentials_file {}: {e}",
                        path.display()
                    ))
                })?;
                let creds: Credentials = serde_json::from_str(&data)?;
                (creds.token, id_string(&creds.chat_id))
            }
            _ => return Ok(None),
        };
        let timeout = Duration::from_secs(config.timeout_seconds);
        Self::new(&config.api_base, token, chat_id, timeout).map(Some)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    fn latest_signal(&self) -> Result<RemoteSignal> {
        let resp = self.http.get(self.method_url("getUpdates")).send()?;
        if !resp.status().is_success() {
            return Err(CastkeeperError::Http(format!("getUpdates: {}", resp.status())));
        }
        let body: ApiResponse<Vec<Update>> = resp.json()?;
        let updates = body.result.unwrap_or_default();
        let signal = updates
            .iter()
            .rev()
            .filter_map(|u| u.message.as_ref())
            .filter(|m| id_string(&m.chat.id) == self.chat_id)
            .map(|m| RemoteSignal::from_message(m.text.as_deref().unwrap_or_default()))
            .find(|s| *s != RemoteSignal::Unknown)
            .unwrap_or(RemoteSignal::Unknown);
        Ok(signal)
    }
}

impl Notifier for TelegramClient {
    fn send(&self, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()?;
        let status = resp.status();
        let body: ApiResponse<Value> = resp.json().unwrap_or(ApiResponse {
            ok: false,
            description: None,
            result: None,
        });
        if !status.is_success() || !body.ok {
            return Err(CastkeeperError::Http(format!(
                "sendMessage: {status} {}",
                body.description.unwrap_or_default()
            )));
        }
        tracing::debug!("telegram message sent");
        Ok(())
    }
}

impl RemoteSignalSource for TelegramClient {
    fn latest(&self) -> RemoteSignal {
        match self.latest_signal() {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "reading remote signal failed");
                RemoteSignal::Unknown
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

    fn client(server: &mockito::ServerGuard) -> TelegramClient {
        TelegramClient::new(server.url(), "T0KEN", "42", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn send_posts_chat_and_text() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/botT0KEN/sendMessage")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chat_id".into(), "42".into()),
                Matcher::UrlEncoded("text".into(), "Stream gestartet".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{}}"#)
            .create();

        client(&server).send("Stream gestartet").unwrap();
        mock.assert();
    }

    #[test]
    fn send_reports_api_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/botT0KEN/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
            .create();

        let err = client(&server).send("x").unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn latest_signal_uses_newest_tag_in_own_chat() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/botT0KEN/getUpdates")
            .with_status(200)
            .with_body(
                r##"{"ok":true,"result":[
                    {"update_id":1,"message":{"chat":{"id":42},"text":"#on"}},
                    {"update_id":2,"message":{"chat":{"id":42},"text":"#off"}},
                    {"update_id":3,"message":{"chat":{"id":42},"text":"danke"}},
                    {"update_id":4,"message":{"chat":{"id":7},"text":"#on"}}
                ]}"##,
            )
            .create();

        assert_eq!(client(&server).latest(), RemoteSignal::Off);
    }

    #[test]
    fn latest_signal_is_unknown_on_http_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/botT0KEN/getUpdates")
            .with_status(502)
            .create();
        assert_eq!(client(&server).latest(), RemoteSignal::Unknown);
    }

    #[test]
    fn credentials_file_accepts_numeric_chat_id() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tg.json"),
            r#"{"token": "abc", "chat_id": -100123}"#,
        )
        .unwrap();
        let config = TelegramConfig {
            credentials_file: Some("tg.json".into()),
            ..TelegramConfig::default()
        };
        let client = TelegramClient::from_config(&config, dir.path()).unwrap().unwrap();
        assert_eq!(client.chat_id, "-100123");
        assert_eq!(client.token, "abc");
    }

    #[test]
    fn unconfigured_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = TelegramConfig::default();
        assert!(TelegramClient::from_config(&config, dir.path()).unwrap().is_none());
    }
}
