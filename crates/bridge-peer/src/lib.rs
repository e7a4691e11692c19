//! Bridge Reference Peer
//!
//! A small service that speaks the bridge packet protocol over stdin/stdout.
//! The `bridge` CLI spawns it by default, and the integration tests drive it
//! in-process over an in-memory stream pair.
//!
//! This crate can be used in two modes:
//! - **Standalone binary**: spawned by a host that owns its stdio
//! - **In-process library**: [`serve`] over any `AsyncRead`/`AsyncWrite` pair

pub mod api;
pub mod client;
pub mod config;
pub mod rpc;
pub mod service;

pub use api::{
    peer_contract, Add, AddParams, Echo, Log, LogPayload, Notice, NoticePayload, Notify, NotifyParams,
    PeerStats, Ping, Sleep, SleepParams, Stats,
};
pub use client::PeerClient;
pub use config::PeerServiceConfig;
pub use rpc::{serve, serve_stdio, PeerError};
pub use service::build_peer;
