//! Packet model
//!
//! Three packet shapes cross a transport:
//! - `request`: `{type, id, method, params}`
//! - `response`: `{type, id, success, payload?, error?}`
//! - `message`: `{type, id, payload}` where `id` carries the message name
//!
//! Payloads are opaque JSON values; the engine never looks inside them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PacketError;

/// Kind tag carried in the `type` field of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Request,
    Response,
    Message,
}

impl PacketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketKind::Request => "request",
            PacketKind::Response => "response",
            PacketKind::Message => "message",
        }
    }

    /// Parse a wire tag; `None` for anything unrecognized.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "request" => Some(PacketKind::Request),
            "response" => Some(PacketKind::Response),
            "message" => Some(PacketKind::Message),
            _ => None,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit crossing a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Packet {
    Request(RequestPacket),
    Response(ResponsePacket),
    Message(MessagePacket),
}

/// Outbound call. `id` is unique among the sender's outstanding requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPacket {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Answer to exactly one request, echoing its `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePacket {
    pub id: u64,
    pub success: bool,
    /// Present when `success` is true; absent for void results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Present when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fire-and-forget notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePacket {
    #[serde(rename = "id")]
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

impl Packet {
    pub fn request(id: u64, method: impl Into<String>, params: Value) -> Self {
        Packet::Request(RequestPacket {
            id,
            method: method.into(),
            params,
        })
    }

    pub fn message(name: impl Into<String>, payload: Value) -> Self {
        Packet::Message(MessagePacket {
            name: name.into(),
            payload,
        })
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Request(_) => PacketKind::Request,
            Packet::Response(_) => PacketKind::Response,
            Packet::Message(_) => PacketKind::Message,
        }
    }

    /// Classify a decoded value.
    ///
    /// The kind tag is checked first so that a missing or unknown tag is
    /// reported as such rather than as a generic deserialization failure.
    pub fn from_value(value: Value) -> Result<Self, PacketError> {
        let kind = match value.get("type") {
            None => return Err(PacketError::MissingType),
            Some(Value::String(tag)) => {
                PacketKind::parse(tag).ok_or_else(|| PacketError::UnknownType(tag.clone()))?
            }
            Some(other) => return Err(PacketError::UnknownType(other.to_string())),
        };

        serde_json::from_value(value).map_err(|e| PacketError::Malformed {
            kind,
            reason: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Result<Value, PacketError> {
        serde_json::to_value(self).map_err(PacketError::Encode)
    }
}

impl From<RequestPacket> for Packet {
    fn from(request: RequestPacket) -> Self {
        Packet::Request(request)
    }
}

impl From<ResponsePacket> for Packet {
    fn from(response: ResponsePacket) -> Self {
        Packet::Response(response)
    }
}

impl From<MessagePacket> for Packet {
    fn from(message: MessagePacket) -> Self {
        Packet::Message(message)
    }
}

impl ResponsePacket {
    pub fn success(id: u64, payload: Value) -> Self {
        Self {
            id,
            success: true,
            payload: if payload.is_null() { None } else { Some(payload) },
            error: None,
        }
    }

    pub fn failure(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Collapse into the value or error message the caller sees.
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.payload.unwrap_or(Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "request failed without an error message".to_string()))
        }
    }
}
