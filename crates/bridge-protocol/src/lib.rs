//! Bridge Protocol Types
//!
//! Defines the packets exchanged between the two endpoints of a bridge
//! channel and the newline-delimited JSON framing used on byte streams.

pub mod codec;
pub mod error;
pub mod packet;

pub use codec::{decode_line, decode_packet, encode_line};
pub use error::PacketError;
pub use packet::{MessagePacket, Packet, PacketKind, RequestPacket, ResponsePacket};

/// Subscription name that matches every inbound message.
pub const WILDCARD: &str = "*";

/// Largest request id handed out before the counter wraps to zero.
pub const DEFAULT_MAX_REQUEST_ID: u64 = 10_000_000_000;

/// Default time a caller waits for a response, in milliseconds.
pub const DEFAULT_MAX_REQUEST_TIME_MS: u64 = 1000;
