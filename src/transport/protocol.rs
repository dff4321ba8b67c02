//! Push channel wire format.
//!
//! The backend hub speaks the SignalR JSON hub protocol over a WebSocket.
//! Only the subset a receive-only client needs is implemented: the
//! handshake, invocations, pings and close. Every message is a JSON object
//! terminated by the ASCII record separator, and one WebSocket frame may
//! carry several of them.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Message terminator
pub const RECORD_SEPARATOR: char = '\u{1e}';

const TYPE_INVOCATION: u8 = 1;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed hub message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invocation without target")]
    MissingTarget,

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Incomplete handshake response")]
    IncompleteHandshake,
}

/// A decoded hub message
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Server calling a client method, i.e. a named push event
    Invocation { target: String, arguments: Vec<Value> },

    /// Keep-alive
    Ping,

    /// Server closing the connection
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },

    /// Message types a receive-only client ignores (completions, streams, acks)
    Ignored(u8),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "allowReconnect")]
    allow_reconnect: bool,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// The handshake a client sends right after the socket opens.
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{RECORD_SEPARATOR}"#)
}

/// Keep-alive frame.
pub fn ping_frame() -> String {
    format!(r#"{{"type":{TYPE_PING}}}{RECORD_SEPARATOR}"#)
}

/// Check the handshake response. Returns whatever followed it in the same
/// frame, which the server may already have packed with messages.
pub fn parse_handshake_response(text: &str) -> Result<&str, ProtocolError> {
    let (first, rest) = text
        .split_once(RECORD_SEPARATOR)
        .ok_or(ProtocolError::IncompleteHandshake)?;
    let response: HandshakeResponse = serde_json::from_str(first)?;
    match response.error {
        Some(error) => Err(ProtocolError::HandshakeRejected(error)),
        None => Ok(rest),
    }
}

/// Split a frame into messages and decode each. A bad record does not
/// poison the others.
pub fn decode_frame(text: &str) -> Vec<Result<HubMessage, ProtocolError>> {
    text.split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(decode_message)
        .collect()
}

fn decode_message(record: &str) -> Result<HubMessage, ProtocolError> {
    let raw: RawMessage = serde_json::from_str(record)?;
    Ok(match raw.kind {
        TYPE_INVOCATION => HubMessage::Invocation {
            target: raw.target.ok_or(ProtocolError::MissingTarget)?,
            arguments: raw.arguments,
        },
        TYPE_PING => HubMessage::Ping,
        TYPE_CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect,
        },
        other => HubMessage::Ignored(other),
    })
}

/// Hub WebSocket URL from the API base URL and hub path.
pub fn hub_url(api_url: &str, hub_path: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{}/{}", base, hub_path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_frames() {
        assert_eq!(handshake_request(), "{\"protocol\":\"json\",\"version\":1}\u{1e}");
        assert_eq!(parse_handshake_response("{}\u{1e}").unwrap(), "");

        let rest = parse_handshake_response("{}\u{1e}{\"type\":6}\u{1e}").unwrap();
        assert_eq!(decode_frame(rest).len(), 1);

        let err = parse_handshake_response("{\"error\":\"Unsupported protocol\"}\u{1e}");
        assert!(matches!(err, Err(ProtocolError::HandshakeRejected(e)) if e == "Unsupported protocol"));
        assert!(matches!(
            parse_handshake_response("{}"),
            Err(ProtocolError::IncompleteHandshake)
        ));
    }

    #[test]
    fn test_decode_batched_frame() {
        let frame = concat!(
            r#"{"type":1,"target":"ProcessStepUpdate","arguments":[{"stepId":"calculating","status":"in_progress"}]}"#,
            "\u{1e}",
            r#"{"type":6}"#,
            "\u{1e}",
            r#"not json"#,
            "\u{1e}",
            r#"{"type":3,"invocationId":"1"}"#,
            "\u{1e}",
        );

        let messages = decode_frame(frame);
        assert_eq!(messages.len(), 4);

        match &messages[0] {
            Ok(HubMessage::Invocation { target, arguments }) => {
                assert_eq!(target, "ProcessStepUpdate");
                assert_eq!(arguments[0]["stepId"], json!("calculating"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(messages[1], Ok(HubMessage::Ping)));
        assert!(messages[2].is_err());
        assert!(matches!(messages[3], Ok(HubMessage::Ignored(3))));
    }

    #[test]
    fn test_decode_close() {
        let messages = decode_frame("{\"type\":7,\"error\":\"Server shutting down\",\"allowReconnect\":true}\u{1e}");
        assert!(matches!(
            &messages[0],
            Ok(HubMessage::Close { error: Some(e), allow_reconnect: true }) if e == "Server shutting down"
        ));
    }

    #[test]
    fn test_hub_url() {
        assert_eq!(
            hub_url("https://demo.example.com/api/", "/hubs/notifications"),
            "wss://demo.example.com/api/hubs/notifications"
        );
        assert_eq!(
            hub_url("http://localhost:5000/api", "hubs/notifications"),
            "ws://localhost:5000/api/hubs/notifications"
        );
    }
}
