//! obs-websocket v5 message framing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const RPC_VERSION: u32 = 1;

pub const OP_HELLO: u8 = 0;
pub const OP_IDENTIFY: u8 = 1;
pub const OP_IDENTIFIED: u8 = 2;
pub const OP_REQUEST: u8 = 6;
pub const OP_REQUEST_RESPONSE: u8 = 7;

/// Every frame is `{ "op": n, "d": {...} }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub result: bool,
    pub code: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn auth_response(password: &str, challenge: &AuthChallenge) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{}", challenge.salt)));
    STANDARD.encode(Sha256::digest(format!("{secret}{}", challenge.challenge)))
}

pub fn identify(authentication: Option<String>) -> Envelope {
    let mut d = json!({
        "rpcVersion": RPC_VERSION,
        "eventSubscriptions": 0,
    });
    if let Some(auth) = authentication {
        d["authentication"] = Value::String(auth);
    }
    Envelope { op: OP_IDENTIFY, d }
}

pub fn request(request_type: &str, request_id: &str, data: Option<Value>) -> Envelope {
    let mut d = json!({
        "requestType": request_type,
        "requestId": request_id,
    });
    if let Some(data) = data {
        d["requestData"] = data;
    }
    Envelope { op: OP_REQUEST, d }
}

/// Input settings for the overlay text source: bold, centered at the top,
/// teal with a white outline on a transparent background.
pub fn text_settings(text: &str) -> Value {
    json!({
        "text": text,
        "font": { "face": "Segoe UI", "size": 100, "style": "Bold" },
        "color1": 0xFF00B3B0u32,
        "alignment": 2,
        "bk_color": 0x00FFFFFFu32,
        "outline": true,
        "outline_size": 2,
        "outline_color": 0xFFFFFFFFu32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_matches_reference_vector() {
        let challenge = AuthChallenge {
            challenge: "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=".into(),
            salt: "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=".into(),
        };
        assert_eq!(
            auth_response("supersecretpassword", &challenge),
            "1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4="
        );
    }

    #[test]
    fn identify_omits_auth_when_not_required() {
        let frame = serde_json::to_value(identify(None)).unwrap();
        assert_eq!(frame["op"], 1);
        assert_eq!(frame["d"]["rpcVersion"], 1);
        assert!(frame["d"].get("authentication").is_none());
    }

    #[test]
    fn parses_request_response() {
        let raw = r#"{"op":7,"d":{"requestType":"GetCurrentProgramScene","requestId":"r1",
            "requestStatus":{"result":true,"code":100},
            "responseData":{"currentProgramSceneName":"Beginn"}}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.op, OP_REQUEST_RESPONSE);
        let resp: RequestResponse = serde_json::from_value(env.d).unwrap();
        assert!(resp.request_status.result);
        assert_eq!(
            resp.response_data.unwrap()["currentProgramSceneName"],
            "Beginn"
        );
    }
}
