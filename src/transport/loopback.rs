//! In-memory linked transport pair.
//!
//! Each packet is encoded to a JSON line and decoded again before delivery,
//! so anything that would not survive a real pipe does not survive here
//! either. Delivery is synchronous: the peer's router runs inside `send`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_protocol::{codec, Packet};
use tracing::warn;

use super::{Inbox, Transport, TransportError};
use crate::rpc::PacketRouter;

/// One end of an in-memory channel. Cheap to clone.
#[derive(Clone)]
pub struct LoopbackTransport {
    local: Arc<Inbox>,
    peer: Arc<Inbox>,
    closed: Arc<AtomicBool>,
}

impl LoopbackTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let a = Arc::new(Inbox::default());
        let b = Arc::new(Inbox::default());
        let closed = Arc::new(AtomicBool::new(false));

        (
            Self {
                local: a.clone(),
                peer: b.clone(),
                closed: closed.clone(),
            },
            Self {
                local: b,
                peer: a,
                closed,
            },
        )
    }

    /// Sever the channel in both directions; later sends fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let line = codec::encode_line(packet)?;
        let value = codec::decode_line(&line)?;

        // A real pipe never reports the receiver's failures back to the sender.
        if let Err(e) = self.peer.deliver(value) {
            warn!(error = %e, "loopback peer rejected packet");
        }
        Ok(())
    }

    fn register_handler(&self, router: PacketRouter) {
        self.local.register(router);
    }

    fn unregister_handler(&self) {
        self.local.unregister();
    }
}
