// common/src/frames.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Interaction;

/// Frame sent from the client to the gateway, discriminated by `action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum OutboundFrame {
    SendMessage(ChatQuestion),
    /// Keep-alive, `{"action":"ping"}`
    Ping,
}

/// A user question plus the short-term context that goes with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuestion {
    pub session_id: String,
    pub lang: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Interaction>,
}

/// Answer produced by the chat backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub status_response: bool,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatAnswer {
    /// Answer text, only when the backend reported success
    pub fn text(&self) -> Option<&str> {
        if self.status_response {
            self.response.as_deref()
        } else {
            None
        }
    }
}

/// Connection bookkeeping pushed by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub connection_id: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Every frame the gateway can push, validated at the transport boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    ChatAnswer(ChatAnswer),
    ConnectionInfo(ConnectionInfo),
    Unrecognized { raw: String, reason: String },
}

const TYPE_FIELD: &str = "type";
const ANSWER_FIELD: &str = "status_response";
const CONNECTION_FIELD: &str = "connectionId";

impl InboundFrame {
    /// Classify a text frame. Never fails: anything that does not validate
    /// comes back as `Unrecognized`.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => Self::unrecognized(text, format!("invalid JSON: {}", e)),
        }
    }

    pub fn from_value(value: Value) -> Self {
        // Some collaborators send the JSON document as a JSON string
        let value = match value {
            Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
                Ok(decoded) => decoded,
                Err(e) => return Self::unrecognized(&inner, format!("invalid JSON string: {}", e)),
            },
            other => other,
        };

        let map = match &value {
            Value::Object(map) => map,
            other => return Self::unrecognized(&other.to_string(), "not a JSON object"),
        };

        match map.get(TYPE_FIELD) {
            Some(Value::String(kind)) => match kind.as_str() {
                "chat_answer" => Self::decode_answer(value),
                "connection_info" => Self::decode_connection(value),
                other => Self::unrecognized(&value.to_string(), format!("unknown frame type `{}`", other)),
            },
            Some(_) => Self::unrecognized(&value.to_string(), "frame type must be a string"),
            None => Self::classify_by_shape(map, value.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::ChatAnswer(_) => "chat_answer",
            InboundFrame::ConnectionInfo(_) => "connection_info",
            InboundFrame::Unrecognized { .. } => "unrecognized",
        }
    }

    fn classify_by_shape(map: &Map<String, Value>, value: Value) -> Self {
        if map.contains_key(ANSWER_FIELD) && map.contains_key(CONNECTION_FIELD) {
            return Self::unrecognized(&value.to_string(), "ambiguous frame");
        }
        let is_answer = map.get(ANSWER_FIELD).map_or(false, Value::is_boolean);
        let is_connection = map.get(CONNECTION_FIELD).map_or(false, Value::is_string);

        if is_answer {
            Self::decode_answer(value)
        } else if is_connection {
            Self::decode_connection(value)
        } else {
            Self::unrecognized(&value.to_string(), "unknown frame shape")
        }
    }

    fn decode_answer(value: Value) -> Self {
        let raw = value.to_string();
        match serde_json::from_value::<ChatAnswer>(value) {
            Ok(answer) => InboundFrame::ChatAnswer(answer),
            Err(e) => Self::unrecognized(&raw, format!("invalid chat answer: {}", e)),
        }
    }

    fn decode_connection(value: Value) -> Self {
        let raw = value.to_string();
        match serde_json::from_value::<ConnectionInfo>(value) {
            Ok(info) => InboundFrame::ConnectionInfo(info),
            Err(e) => Self::unrecognized(&raw, format!("invalid connection info: {}", e)),
        }
    }

    fn unrecognized(raw: &str, reason: impl Into<String>) -> Self {
        InboundFrame::Unrecognized {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}
