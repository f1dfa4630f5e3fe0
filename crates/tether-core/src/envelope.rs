//! Wire-format types shared by the client and server.
//!
//! Two frame shapes travel over a link: the client sends [`RequestEnvelope`]
//! objects, the server answers with frames carrying either a response body
//! (correlated by `uuid`) or an unsolicited push (routed by `command`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Well-known codes and messages ───────────────────────────────────

/// Success.
pub const CODE_OK: i32 = 0;
/// Generic application/server failure.
pub const CODE_SERVER_ERROR: i32 = 1;
/// Unknown command or unparseable request.
pub const CODE_NOT_FOUND: i32 = 404;

/// Message carried by successful response bodies.
pub const MSG_SUCCESS: &str = "Success";
/// Default body message when a handler never replied.
pub const MSG_SERVER_ERROR: &str = "Server error";
/// Synthetic body message when the retry budget is spent.
pub const MSG_RETRIES_EXHAUSTED: &str = "retries exhausted";
/// Response message for a frame that failed to decode.
pub const MSG_PARSE_ERROR: &str = "error parsing request";
/// Response message for an unregistered command.
pub const MSG_COMMAND_NOT_FOUND: &str = "command not found";

// ── Frames ──────────────────────────────────────────────────────────

/// Outbound request, client → server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Protocol/application version string supplied by the client.
    pub version: String,
    /// Correlation id, unique per call.
    pub uuid: String,
    /// Route string, e.g. `api/pd/test`.
    pub command: String,
    /// Opaque request payload.
    pub payload: Value,
}

/// Discriminator for server → client frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Answers a pending request; the frame's `uuid` names it.
    Response,
    /// Unsolicited message; the frame's `command` names the topic.
    Push,
}

/// Inbound frame, server → client, as the client decodes it.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundFrame {
    /// Correlation id; empty for pushes.
    #[serde(default)]
    pub uuid: String,
    /// Frame discriminator.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Push topic; empty for responses.
    #[serde(default)]
    pub command: String,
    /// Frame body: a [`ResponseBody`] object or a push payload.
    #[serde(default)]
    pub body: Value,
}

/// Outbound frame, server → client, as the server builds it.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundFrame {
    /// Correlation id; empty for pushes.
    pub uuid: String,
    /// Frame discriminator.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Command echoed for responses, topic for pushes.
    pub command: String,
    /// Frame body.
    pub body: Value,
}

// ── Bodies ──────────────────────────────────────────────────────────

/// Body of a response frame. `code == 0` means success; any nonzero code is
/// an application-defined failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Correlation id of the request this answers.
    #[serde(default)]
    pub uuid: String,
    /// Application result code.
    pub code: i32,
    /// Human-readable reason.
    pub message: String,
    /// Result payload.
    #[serde(default)]
    pub data: Value,
}

impl ResponseBody {
    /// Build a success body.
    pub fn ok(uuid: impl Into<String>, data: Value) -> Self {
        Self {
            uuid: uuid.into(),
            code: CODE_OK,
            message: MSG_SUCCESS.to_owned(),
            data,
        }
    }

    /// Build a failure body.
    pub fn fail(uuid: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            code,
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Whether this body reports success.
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

/// Inner payload of a push frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushBody {
    /// Topic the push was addressed to.
    pub command: String,
    /// Push payload.
    #[serde(default)]
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── RequestEnvelope ─────────────────────────────────────────────

    #[test]
    fn request_envelope_wire_keys() {
        let env = RequestEnvelope {
            version: "1.0".into(),
            uuid: "u1".into(),
            command: "api/echo".into(),
            payload: json!({"x": 1}),
        };
        let v: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(v["version"], "1.0");
        assert_eq!(v["uuid"], "u1");
        assert_eq!(v["command"], "api/echo");
        assert_eq!(v["payload"]["x"], 1);
    }

    #[test]
    fn request_envelope_roundtrip() {
        let raw = r#"{"version":"2","uuid":"abc","command":"ping","payload":null}"#;
        let env: RequestEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.version, "2");
        assert_eq!(env.uuid, "abc");
        assert_eq!(env.command, "ping");
        assert!(env.payload.is_null());
    }

    // ── Frames ──────────────────────────────────────────────────────

    #[test]
    fn inbound_response_frame() {
        let raw = r#"{"uuid":"r1","type":"response","command":"","body":{"uuid":"r1","code":0,"message":"Success","data":{"y":2}}}"#;
        let frame: InboundFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, FrameKind::Response);
        assert_eq!(frame.uuid, "r1");
        let body: ResponseBody = serde_json::from_value(frame.body).unwrap();
        assert!(body.is_ok());
        assert_eq!(body.data["y"], 2);
    }

    #[test]
    fn inbound_push_frame_without_uuid() {
        let raw = r#"{"type":"push","command":"notices","body":{"command":"notices","data":"hi"}}"#;
        let frame: InboundFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, FrameKind::Push);
        assert!(frame.uuid.is_empty());
        assert_eq!(frame.command, "notices");
    }

    #[test]
    fn inbound_unknown_kind_is_error() {
        let raw = r#"{"uuid":"x","type":"gossip","body":null}"#;
        assert!(serde_json::from_str::<InboundFrame>(raw).is_err());
    }

    #[test]
    fn outbound_frame_kind_tag() {
        let frame = OutboundFrame {
            uuid: String::new(),
            kind: FrameKind::Push,
            command: "alerts".into(),
            body: json!({"command": "alerts", "data": 1}),
        };
        let v: Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(v["type"], "push");
        assert_eq!(v["command"], "alerts");
    }

    #[test]
    fn outbound_response_decodes_as_inbound() {
        let out = OutboundFrame {
            uuid: "q9".into(),
            kind: FrameKind::Response,
            command: "api/echo".into(),
            body: serde_json::to_value(ResponseBody::ok("q9", json!(42))).unwrap(),
        };
        let text = serde_json::to_string(&out).unwrap();
        let back: InboundFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind, FrameKind::Response);
        assert_eq!(back.uuid, "q9");
    }

    // ── Bodies ──────────────────────────────────────────────────────

    #[test]
    fn response_body_ok() {
        let body = ResponseBody::ok("u", json!({"a": true}));
        assert_eq!(body.code, CODE_OK);
        assert_eq!(body.message, MSG_SUCCESS);
        assert!(body.is_ok());
    }

    #[test]
    fn response_body_fail() {
        let body = ResponseBody::fail("u", 7, "nope");
        assert_eq!(body.code, 7);
        assert_eq!(body.message, "nope");
        assert!(body.data.is_null());
        assert!(!body.is_ok());
    }

    #[test]
    fn response_body_tolerates_missing_fields() {
        let raw = r#"{"code":1,"message":"retries exhausted"}"#;
        let body: ResponseBody = serde_json::from_str(raw).unwrap();
        assert!(body.uuid.is_empty());
        assert!(body.data.is_null());
        assert_eq!(body.message, MSG_RETRIES_EXHAUSTED);
    }

    #[test]
    fn push_body_roundtrip() {
        let body = PushBody {
            command: "news".into(),
            data: json!(["a", "b"]),
        };
        let text = serde_json::to_string(&body).unwrap();
        let back: PushBody = serde_json::from_str(&text).unwrap();
        assert_eq!(back.command, "news");
        assert_eq!(back.data[1], "b");
    }
}
