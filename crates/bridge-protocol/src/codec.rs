//! Newline-delimited JSON framing.
//!
//! One packet per line. `serde_json` escapes embedded newlines, so the
//! delimiter never appears inside an encoded packet.

use serde_json::Value;

use crate::error::PacketError;
use crate::packet::Packet;

/// Encode a packet as a single line, including the trailing `\n`.
pub fn encode_line(packet: &Packet) -> Result<String, PacketError> {
    let mut line = serde_json::to_string(packet).map_err(PacketError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Decode one framed line into a raw JSON value.
///
/// Classification is left to [`Packet::from_value`] so the router can
/// report a missing kind tag separately from broken framing.
pub fn decode_line(line: &str) -> Result<Value, PacketError> {
    let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
    serde_json::from_str(trimmed).map_err(|e| PacketError::InvalidJson(e.to_string()))
}

/// Decode and classify one framed line.
pub fn decode_packet(line: &str) -> Result<Packet, PacketError> {
    Packet::from_value(decode_line(line)?)
}
