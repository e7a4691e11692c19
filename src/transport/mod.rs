//! Transport Layer
//!
//! The engine never touches bytes directly. A transport provides up to three
//! capabilities and the engine checks for the ones an operation needs before
//! attempting it:
//! - `send`: push one packet toward the peer
//! - `registerHandler`: deliver inbound packets to the instance's router
//! - `unregisterHandler`: detach the router before a transport swap
//!
//! Concrete adapters:
//! - [`StubTransport`]: inert placeholder that only accepts a router
//! - [`LoopbackTransport`]: linked in-memory pair
//! - [`StreamTransport`]: newline-delimited JSON over async byte streams
//! - [`CallbackTransport`]: in-process bridge driven by closures

use std::collections::VecDeque;
use std::fmt;
use std::io;

use bridge_protocol::{Packet, PacketError};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RpcError;
use crate::rpc::PacketRouter;

mod callback;
mod loopback;
mod stream;
mod stub;

pub use callback::CallbackTransport;
pub use loopback::LoopbackTransport;
pub use stream::StreamTransport;
pub use stub::{DetachedTransport, StubTransport};

/// One optional member of the transport interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Send,
    RegisterHandler,
    UnregisterHandler,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Send => "send",
            Capability::RegisterHandler => "registerHandler",
            Capability::UnregisterHandler => "unregisterHandler",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel the engine can push packets into and receive packets from.
///
/// Implementations advertise what they support through [`Transport::provides`];
/// the engine never calls a member whose capability is not provided.
pub trait Transport: Send + Sync {
    /// Whether this transport implements `capability`. All by default.
    fn provides(&self, capability: Capability) -> bool {
        let _ = capability;
        true
    }

    /// Push one packet toward the peer. Must not block on the peer.
    fn send(&self, packet: &Packet) -> Result<(), TransportError>;

    /// Install the router invoked once per inbound packet.
    fn register_handler(&self, router: PacketRouter);

    /// Detach the previously registered router.
    fn unregister_handler(&self) {}
}

/// Check `needed` against the transport, naming every missing capability.
pub(crate) fn require(
    transport: &dyn Transport,
    needed: &[Capability],
    action: &'static str,
) -> Result<(), RpcError> {
    let missing: Vec<Capability> = needed
        .iter()
        .copied()
        .filter(|c| !transport.provides(*c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RpcError::missing(action, missing))
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport does not support `{0}`")]
    Unsupported(Capability),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] PacketError),

    #[error("no Tokio runtime is available to drive the transport")]
    NoRuntime,

    #[error("bridge callback failed: {0}")]
    Callback(String),
}

/// Packets held while no router is registered.
const MAX_BACKLOG: usize = 1024;

/// Inbound side shared by the concrete transports.
///
/// Values arriving before a router is registered are buffered and flushed,
/// in arrival order, on registration.
#[derive(Default)]
pub(crate) struct Inbox {
    state: Mutex<InboxState>,
}

#[derive(Default)]
struct InboxState {
    router: Option<PacketRouter>,
    backlog: VecDeque<Value>,
}

impl Inbox {
    pub(crate) fn register(&self, router: PacketRouter) {
        loop {
            let pending = {
                let mut state = self.state.lock();
                if state.backlog.is_empty() {
                    state.router = Some(router);
                    return;
                }
                std::mem::take(&mut state.backlog)
            };

            debug!(count = pending.len(), "flushing buffered inbound packets");
            for value in pending {
                if let Err(e) = router.route(value) {
                    warn!(error = %e, "buffered packet rejected");
                }
            }
        }
    }

    pub(crate) fn unregister(&self) {
        self.state.lock().router = None;
    }

    /// Hand one inbound value to the router, or buffer it.
    pub(crate) fn deliver(&self, value: Value) -> Result<(), RpcError> {
        let router = {
            let mut state = self.state.lock();
            match &state.router {
                Some(router) => router.clone(),
                None => {
                    if state.backlog.len() >= MAX_BACKLOG {
                        warn!(limit = MAX_BACKLOG, "inbound backlog full; dropping oldest packet");
                        state.backlog.pop_front();
                    }
                    state.backlog.push_back(value);
                    return Ok(());
                }
            }
        };
        router.route(value)
    }

    #[cfg(test)]
    pub(crate) fn backlog_len(&self) -> usize {
        self.state.lock().backlog.len()
    }
}
