//! Peer service contract.
//!
//! Side `A` is the host that launches the peer; side `B` is the peer.
//! The host answers no requests and emits `log`. The peer answers the
//! requests below and emits `notice`.

use bridge_rpc::schema::{Contract, Schema};
use bridge_rpc::{MessageDef, RequestDef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Liveness check; answers `"pong"`.
pub struct Ping;

impl RequestDef for Ping {
    const METHOD: &'static str = "ping";
    type Params = ();
    type Response = String;
}

/// Returns its params unchanged.
pub struct Echo;

impl RequestDef for Echo {
    const METHOD: &'static str = "echo";
    type Params = Value;
    type Response = Value;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddParams {
    pub x: i64,
    pub y: i64,
}

pub struct Add;

impl RequestDef for Add {
    const METHOD: &'static str = "add";
    type Params = AddParams;
    type Response = i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepParams {
    pub ms: u64,
}

/// Waits before answering with no payload. Useful for timeout checks.
pub struct Sleep;

impl RequestDef for Sleep {
    const METHOD: &'static str = "sleep";
    type Params = SleepParams;
    type Response = ();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyParams {
    pub text: String,
}

/// Makes the peer emit a `notice` back before answering.
pub struct Notify;

impl RequestDef for Notify {
    const METHOD: &'static str = "notify";
    type Params = NotifyParams;
    type Response = ();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStats {
    pub logs_received: u64,
    pub notices_sent: u64,
}

pub struct Stats;

impl RequestDef for Stats {
    const METHOD: &'static str = "stats";
    type Params = ();
    type Response = PeerStats;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    pub msg: String,
}

/// Host to peer: a line for the peer's log.
pub struct Log;

impl MessageDef for Log {
    const NAME: &'static str = "log";
    type Payload = LogPayload;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticePayload {
    pub text: String,
}

/// Peer to host.
pub struct Notice;

impl MessageDef for Notice {
    const NAME: &'static str = "notice";
    type Payload = NoticePayload;
}

pub fn peer_contract() -> Contract {
    Contract::new(
        Schema::new().message::<Log>(),
        Schema::new()
            .request::<Ping>()
            .request::<Echo>()
            .request::<Add>()
            .request::<Sleep>()
            .request::<Notify>()
            .request::<Stats>()
            .message::<Notice>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_rpc::Side;

    #[test]
    fn test_host_view() {
        let pair = peer_contract().pair_for(Side::A);
        assert!(pair.remote.has_request("add"));
        assert!(pair.remote.has_message("log"));
        assert!(pair.local.has_message("notice"));
        assert!(pair.local.requests.is_empty());
    }

    #[test]
    fn test_peer_view() {
        let pair = peer_contract().pair_for(Side::B);
        assert!(pair.local.has_request("sleep"));
        assert!(pair.local.has_message("log"));
        assert!(pair.remote.has_message("notice"));
        assert!(pair.remote.requests.is_empty());
    }
}
