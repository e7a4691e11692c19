//! Placeholder transports.

use bridge_protocol::Packet;

use super::{Capability, Transport, TransportError};
use crate::rpc::PacketRouter;

/// Accepts a router and ignores it; cannot send.
///
/// Installed before the real channel exists so that message listeners can
/// be registered early. Replaced wholesale by `set_transport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubTransport;

impl Transport for StubTransport {
    fn provides(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::RegisterHandler | Capability::UnregisterHandler
        )
    }

    fn send(&self, _packet: &Packet) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(Capability::Send))
    }

    fn register_handler(&self, _router: PacketRouter) {}
}

/// Provides nothing. An instance created without a transport holds one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedTransport;

impl Transport for DetachedTransport {
    fn provides(&self, _capability: Capability) -> bool {
        false
    }

    fn send(&self, _packet: &Packet) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(Capability::Send))
    }

    fn register_handler(&self, _router: PacketRouter) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_only_receives() {
        assert!(StubTransport.provides(Capability::RegisterHandler));
        assert!(!StubTransport.provides(Capability::Send));
        assert!(matches!(
            StubTransport.send(&Packet::message("x", serde_json::Value::Null)),
            Err(TransportError::Unsupported(Capability::Send))
        ));
    }

    #[test]
    fn test_detached_provides_nothing() {
        for capability in [
            Capability::Send,
            Capability::RegisterHandler,
            Capability::UnregisterHandler,
        ] {
            assert!(!DetachedTransport.provides(capability));
        }
    }
}
