//! Packet classification and codec errors.

use crate::packet::PacketKind;

/// Errors raised while classifying, decoding or encoding a packet.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The value has no `type` field (or is not an object at all).
    #[error("packet does not contain a type")]
    MissingType,

    /// The `type` field names something other than request/response/message.
    #[error("unexpected packet type: {0}")]
    UnknownType(String),

    /// The kind tag is valid but the remaining fields are not.
    #[error("malformed {kind} packet: {reason}")]
    Malformed { kind: PacketKind, reason: String },

    /// A framed line is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("failed to encode packet: {0}")]
    Encode(#[source] serde_json::Error),
}
