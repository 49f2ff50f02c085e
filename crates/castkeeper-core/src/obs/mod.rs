//! [`ProductionTool`] backed by OBS Studio's websocket server (protocol v5).
//!
//! Blocking client on `tungstenite`: each session is one TCP connection with
//! read/write timeouts, so no call can hang the timeline.

pub mod protocol;

use crate::config::ObsConfig;
use crate::error::{CastkeeperError, Result};
use crate::production::{ProductionSession, ProductionTool, StreamDestination};
use protocol::{Envelope, Hello, RequestResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tungstenite::{Message, WebSocket};

#[derive(Deserialize)]
struct PasswordFile {
    password: String,
}

/// Connection parameters for an OBS instance.
#[derive(Debug, Clone)]
pub struct ObsTool {
    host: String,
    port: u16,
    password: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ObsTool {
    pub fn new(host: impl Into<String>, port: u16, password: Option<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Build from config, reading `password_file` (relative to `root`) when
    /// no inline password is set.
    pub fn from_config(obs: &ObsConfig, root: &Path) -> Result<Self> {
        let password = match (&obs.password, &obs.password_file) {
            (Some(p), _) => Some(p.clone()),
            (None, Some(file)) => {
                let path = crate::paths::resolve(root, file);
                let data = std::fs::read_to_string(&path).map_err(|e| {
                    CastkeeperError::InvalidConfig(format!(
                        "obs.password_file {}: {e}",
                        path.display()
                    ))
                })?;
                let parsed: PasswordFile = serde_json::from_str(&data)?;
                Some(parsed.password)
            }
            (None, None) => None,
        };
        Ok(Self {
            host: obs.host.clone(),
            port: obs.port,
            password,
            connect_timeout: Duration::from_secs(obs.connect_timeout_seconds),
            request_timeout: Duration::from_secs(obs.request_timeout_seconds),
        })
    }

    fn open_stream(&self) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.request_timeout))?;
                    stream.set_write_timeout(Some(self.request_timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => CastkeeperError::Production(format!(
                "connecting to {}:{}: {e}",
                self.host, self.port
            )),
            None => CastkeeperError::Production(format!("no address for {}", self.host)),
        })
    }
}

impl ProductionTool for ObsTool {
    fn connect(&self) -> Result<Box<dyn ProductionSession>> {
        let stream = self.open_stream()?;
        let url = format!("ws://{}:{}", self.host, self.port);
        let (socket, _) = tungstenite::client(url.as_str(), stream)
            .map_err(|e| CastkeeperError::Production(format!("websocket handshake: {e}")))?;
        let mut session = ObsSession { socket };
        session.identify(self.password.as_deref())?;
        tracing::debug!(host = %self.host, port = self.port, "connected to obs-websocket");
        Ok(Box::new(session))
    }
}

// ---------------------------------------------------------------------------
// ObsSession
// ---------------------------------------------------------------------------

pub struct ObsSession {
    socket: WebSocket<TcpStream>,
}

impl ObsSession {
    fn send(&mut self, envelope: &Envelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        self.socket.send(Message::Text(text.into()))?;
        Ok(())
    }

    /// Next frame with opcode `op`; events and other frames are skipped.
    fn wait_for(&mut self, op: u8) -> Result<Envelope> {
        loop {
            match self.socket.read()? {
                Message::Text(text) => {
                    let envelope: Envelope = serde_json::from_str(&text)?;
                    if envelope.op == op {
                        return Ok(envelope);
                    }
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_default();
                    return Err(CastkeeperError::Production(format!(
                        "connection closed by obs {reason}"
                    )));
                }
                _ => {}
            }
        }
    }

    fn identify(&mut self, password: Option<&str>) -> Result<()> {
        let hello: Hello = serde_json::from_value(self.wait_for(protocol::OP_HELLO)?.d)?;
        tracing::debug!(
            version = %hello.obs_web_socket_version,
            rpc = hello.rpc_version,
            "obs hello"
        );
        let auth = match (&hello.authentication, password) {
            (Some(challenge), Some(pw)) => Some(protocol::auth_response(pw, challenge)),
            (Some(_), None) => {
                return Err(CastkeeperError::Production(
                    "obs requires a password but none is configured".into(),
                ))
            }
            (None, _) => None,
        };
        self.send(&protocol::identify(auth))?;
        self.wait_for(protocol::OP_IDENTIFIED)?;
        Ok(())
    }

    /// Send one request and wait for its response data.
    fn call(&mut self, request_type: &str, data: Option<Value>) -> Result<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        self.send(&protocol::request(request_type, &id, data))?;
        loop {
            let envelope = self.wait_for(protocol::OP_REQUEST_RESPONSE)?;
            let response: RequestResponse = serde_json::from_value(envelope.d)?;
            if response.request_id != id {
                continue;
            }
            if !response.request_status.result {
                return Err(CastkeeperError::ProductionRequest {
                    request: response.request_type,
                    code: response.request_status.code,
                    comment: response.request_status.comment.unwrap_or_default(),
                });
            }
            return Ok(response.response_data.unwrap_or(Value::Null));
        }
    }
}

fn str_field(data: &Value, keys: &[&str]) -> Result<String> {
    keys.iter()
        .find_map(|k| data.get(k).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| CastkeeperError::Production(format!("response lacks {}", keys.join("/"))))
}

impl ProductionSession for ObsSession {
    fn set_text(&mut self, source: &str, text: &str) -> Result<()> {
        self.call(
            "SetInputSettings",
            Some(json!({
                "inputName": source,
                "inputSettings": protocol::text_settings(text),
                "overlay": false,
            })),
        )?;
        tracing::info!(source, text, "overlay text updated");
        Ok(())
    }

    fn switch_scene(&mut self, scene: &str) -> Result<()> {
        self.call("SetCurrentProgramScene", Some(json!({ "sceneName": scene })))?;
        tracing::info!(scene, "scene switched");
        Ok(())
    }

    fn current_scene(&mut self) -> Result<String> {
        let data = self.call("GetCurrentProgramScene", None)?;
        str_field(&data, &["currentProgramSceneName", "sceneName"])
    }

    fn set_stream_destination(&mut self, destination: &StreamDestination) -> Result<()> {
        self.call(
            "SetStreamServiceSettings",
            Some(json!({
                "streamServiceType": "rtmp_custom",
                "streamServiceSettings": {
                    "server": destination.server,
                    "key": destination.key,
                    "use_auth": false,
                },
            })),
        )?;
        tracing::info!(
            server = %destination.server,
            key_set = !destination.key.is_empty(),
            "stream destination set"
        );
        Ok(())
    }

    fn stream_destination(&mut self) -> Result<StreamDestination> {
        let data = self.call("GetStreamServiceSettings", None)?;
        let settings = data.get("streamServiceSettings").cloned().unwrap_or(Value::Null);
        Ok(StreamDestination {
            server: str_field(&settings, &["server"]).unwrap_or_default(),
            key: str_field(&settings, &["key"]).unwrap_or_default(),
        })
    }

    fn start_stream(&mut self) -> Result<()> {
        self.call("StartStream", None)?;
        tracing::info!("stream started");
        Ok(())
    }

    fn stream_output_active(&mut self) -> Result<bool> {
        let data = self.call("GetStreamStatus", None)?;
        data.get("outputActive")
            .and_then(Value::as_bool)
            .ok_or_else(|| CastkeeperError::Production("response lacks outputActive".into()))
    }

    fn close(&mut self) -> Result<()> {
        match self.socket.close(None) {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => {}
            Err(e) => return Err(e.into()),
        }
        // Best effort: drain until the server acknowledges the close.
        while self.socket.read().is_ok() {}
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    const SALT: &str = "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=";
    const CHALLENGE: &str = "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=";

    fn reply(ws: &mut WebSocket<TcpStream>, value: Value) {
        ws.send(Message::Text(value.to_string().into())).unwrap();
    }

    /// Minimal obs-websocket server for one client. Returns the request types
    /// it saw once the client disconnects.
    fn fake_obs(password: &'static str) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            reply(
                &mut ws,
                json!({"op": 0, "d": {"obsWebSocketVersion": "5.4.2", "rpcVersion": 1,
                    "authentication": {"challenge": CHALLENGE, "salt": SALT}}}),
            );
            let challenge = protocol::AuthChallenge {
                challenge: CHALLENGE.into(),
                salt: SALT.into(),
            };
            let expected = protocol::auth_response(password, &challenge);

            let mut seen = Vec::new();
            let mut scene = String::from("Beginn");
            let mut settings = json!({});
            let mut streaming = false;
            while let Ok(msg) = ws.read() {
                let Message::Text(text) = msg else { continue };
                let env: Envelope = serde_json::from_str(&text).unwrap();
                if env.op == protocol::OP_IDENTIFY {
                    if env.d["authentication"] != expected.as_str() {
                        return seen;
                    }
                    reply(&mut ws, json!({"op": 2, "d": {"negotiatedRpcVersion": 1}}));
                    continue;
                }
                let request_type = env.d["requestType"].as_str().unwrap().to_string();
                let data = match request_type.as_str() {
                    "SetCurrentProgramScene" => {
                        scene = env.d["requestData"]["sceneName"].as_str().unwrap().into();
                        json!({})
                    }
                    "GetCurrentProgramScene" => json!({ "currentProgramSceneName": scene }),
                    "SetStreamServiceSettings" => {
                        settings = env.d["requestData"]["streamServiceSettings"].clone();
                        json!({})
                    }
                    "GetStreamServiceSettings" => json!({
                        "streamServiceType": "rtmp_custom",
                        "streamServiceSettings": settings,
                    }),
                    "StartStream" => {
                        streaming = true;
                        json!({})
                    }
                    "GetStreamStatus" => json!({ "outputActive": streaming }),
                    _ => json!({}),
                };
                let ok = request_type != "SetInputSettings"
                    || env.d["requestData"]["inputName"] == "Titel";
                reply(
                    &mut ws,
                    json!({"op": 7, "d": {
                        "requestType": request_type,
                        "requestId": env.d["requestId"],
                        "requestStatus": if ok {
                            json!({"result": true, "code": 100})
                        } else {
                            json!({"result": false, "code": 600, "comment": "No source was found"})
                        },
                        "responseData": data,
                    }}),
                );
                seen.push(request_type);
            }
            seen
        });
        (port, handle)
    }

    #[test]
    fn drives_a_full_configure_sequence() {
        let (port, server) = fake_obs("hunter2");
        let tool = ObsTool::new("127.0.0.1", port, Some("hunter2".into()));
        let mut session = tool.connect().unwrap();

        session.set_text("Titel", "Hochamt\n10:00 Uhr").unwrap();
        session.switch_scene("Gottesdienst").unwrap();
        assert_eq!(session.current_scene().unwrap(), "Gottesdienst");
        let dest = StreamDestination {
            server: "rtmp://a.rtmp.youtube.com/live2".into(),
            key: "abcd-efgh".into(),
        };
        session.set_stream_destination(&dest).unwrap();
        assert_eq!(session.stream_destination().unwrap(), dest);
        assert!(!session.stream_output_active().unwrap());
        session.start_stream().unwrap();
        assert!(session.stream_output_active().unwrap());
        session.close().unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen.first().map(String::as_str), Some("SetInputSettings"));
        assert!(seen.iter().any(|r| r == "StartStream"));
    }

    #[test]
    fn failed_request_carries_status() {
        let (port, server) = fake_obs("pw");
        let tool = ObsTool::new("127.0.0.1", port, Some("pw".into()));
        let mut session = tool.connect().unwrap();
        let err = session.set_text("Missing", "x").unwrap_err();
        assert!(matches!(
            err,
            CastkeeperError::ProductionRequest { code: 600, .. }
        ));
        session.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn wrong_password_fails_to_connect() {
        let (port, server) = fake_obs("right");
        let tool = ObsTool::new("127.0.0.1", port, Some("wrong".into()));
        assert!(tool.connect().is_err());
        server.join().unwrap();
    }

    #[test]
    fn missing_password_is_reported() {
        let (port, server) = fake_obs("right");
        let tool = ObsTool::new("127.0.0.1", port, None);
        let err = tool.connect().err().unwrap();
        assert!(err.to_string().contains("password"));
        drop(tool);
        // The server is still waiting for Identify; the client socket is
        // gone so its read fails and it returns.
        server.join().unwrap();
    }

    #[test]
    fn unreachable_host_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let tool = ObsTool::new("127.0.0.1", port, None);
        assert!(tool.connect().is_err());
    }

    #[test]
    fn password_file_is_read_relative_to_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("obs.json"), r#"{"password": "s3cret"}"#).unwrap();
        let obs = ObsConfig {
            password_file: Some("obs.json".into()),
            ..ObsConfig::default()
        };
        let tool = ObsTool::from_config(&obs, dir.path()).unwrap();
        assert_eq!(tool.password.as_deref(), Some("s3cret"));
    }
}
