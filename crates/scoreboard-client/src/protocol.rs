//! Wire codec for the two envelope dialects
//!
//! - **Legacy**: generic `{"event": .., "data": ..}` envelopes in both
//!   directions.
//! - **V2**: structured `{"type": ..}` frames. The server pushes
//!   `INITIAL_STATE`, `STATE_PATCH` and `PORTS`; the client sends `COMMAND`.
//!
//! Decoding never panics; anything that does not match the selected dialect
//! is reported as [`Error::Protocol`] so the caller can log and drop it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scoreboard_core::prelude::*;
use scoreboard_core::{Patch, PortList, Snapshot};

/// Envelope dialect, fixed for the lifetime of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    #[serde(alias = "v1")]
    Legacy,
    #[default]
    V2,
}

impl ProtocolVersion {
    /// Socket path used when no override is configured
    pub fn default_path(&self) -> &'static str {
        match self {
            ProtocolVersion::Legacy => "/ws",
            ProtocolVersion::V2 => "/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::Legacy => "legacy",
            ProtocolVersion::V2 => "v2",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" => Ok(ProtocolVersion::Legacy),
            "v2" => Ok(ProtocolVersion::V2),
            other => Err(Error::config(format!("unknown protocol '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Legacy envelope
// ---------------------------------------------------------------------------

/// Generic `{event, data}` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::protocol(format!("malformed event envelope: {e}")))
    }

    /// Payload handed to event handlers; `null` when absent
    pub fn data_or_null(&self) -> &Value {
        self.data.as_ref().unwrap_or(&Value::Null)
    }
}

// ---------------------------------------------------------------------------
// V2 frames
// ---------------------------------------------------------------------------

/// Server-to-client structured frame.
///
/// The body is read from the named field or from `data`, which is what the
/// server actually writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    InitialState {
        #[serde(alias = "data")]
        state: Snapshot,
    },
    StatePatch {
        #[serde(alias = "data")]
        patch: Patch,
    },
    Ports {
        #[serde(alias = "data")]
        ports: PortList,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::protocol(format!("malformed server frame: {e}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::InitialState { .. } => "INITIAL_STATE",
            ServerMessage::StatePatch { .. } => "STATE_PATCH",
            ServerMessage::Ports { .. } => "PORTS",
        }
    }
}

/// Client-to-server `COMMAND` frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "COMMAND")]
pub struct CommandFrame {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CommandFrame {
    pub fn new(command: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            command: command.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_omits_absent_data() {
        let text = Envelope::new("buzzer", None).encode().unwrap();
        assert_eq!(text, r#"{"event":"buzzer"}"#);
    }

    #[test]
    fn test_envelope_with_data() {
        let text = Envelope::new("goal", Some(json!({ "team": "home" })))
            .encode()
            .unwrap();
        assert_eq!(text, r#"{"event":"goal","data":{"team":"home"}}"#);
    }

    #[test]
    fn test_envelope_decode_missing_data_is_null() {
        let env = Envelope::decode(r#"{"event":"power"}"#).unwrap();
        assert_eq!(env.event, "power");
        assert_eq!(env.data_or_null(), &Value::Null);
    }

    #[test]
    fn test_envelope_decode_rejects_structured_frame() {
        assert!(Envelope::decode(r#"{"type":"INITIAL_STATE","state":{}}"#).is_err());
        assert!(Envelope::decode("not json").is_err());
    }

    #[test]
    fn test_server_message_named_fields() {
        let msg = ServerMessage::decode(r#"{"type":"INITIAL_STATE","state":{"period":1}}"#).unwrap();
        match msg {
            ServerMessage::InitialState { state } => {
                assert_eq!(state.to_value(), json!({ "period": 1 }))
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_server_message_accepts_data_alias() {
        let msg =
            ServerMessage::decode(r#"{"type":"STATE_PATCH","data":{"b.x":1,"a.y":2}}"#).unwrap();
        match msg {
            ServerMessage::StatePatch { patch } => {
                assert_eq!(patch.paths().collect::<Vec<_>>(), vec!["b.x", "a.y"]);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_server_message_ports() {
        let msg = ServerMessage::decode(
            r#"{"type":"PORTS","data":{"ports":["/dev/ttyUSB0"],"currentPort":""}}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), "PORTS");
    }

    #[test]
    fn test_server_message_rejects_unknown_and_legacy() {
        assert!(ServerMessage::decode(r#"{"type":"HELLO"}"#).is_err());
        assert!(ServerMessage::decode(r#"{"event":"update","data":{}}"#).is_err());
        assert!(ServerMessage::decode(r#"{"type":"STATE_PATCH","patch":[1]}"#).is_err());
    }

    #[test]
    fn test_command_frame_shape() {
        let text = CommandFrame::new("START_CLOCK", None).encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "type": "COMMAND", "command": "START_CLOCK" }));

        let text = CommandFrame::new("SET_PERIOD", Some(json!({ "period": 2 })))
            .encode()
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({ "type": "COMMAND", "command": "SET_PERIOD", "payload": { "period": 2 } })
        );
    }

    #[test]
    fn test_protocol_version_parse_and_paths() {
        assert_eq!("legacy".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Legacy);
        assert_eq!("V2".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V2);
        assert!("v3".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::Legacy.default_path(), "/ws");
        assert_eq!(ProtocolVersion::V2.default_path(), "/");
    }
}
