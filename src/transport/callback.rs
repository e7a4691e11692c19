//! In-process bridge transport.
//!
//! Outbound packets are handed to a closure as structured JSON values;
//! inbound values are pushed in by whoever owns the other side of the
//! bridge, typically a native event callback.

use std::fmt;
use std::sync::Arc;

use bridge_protocol::{codec, Packet};
use serde_json::Value;

use super::{Inbox, Transport, TransportError};
use crate::error::RpcError;
use crate::rpc::PacketRouter;

type Outbound = Arc<dyn Fn(Value) -> Result<(), TransportError> + Send + Sync>;

/// Transport driven by a send closure and explicit `deliver` calls.
#[derive(Clone)]
pub struct CallbackTransport {
    outbound: Outbound,
    inbox: Arc<Inbox>,
}

impl CallbackTransport {
    pub fn new<F>(outbound: F) -> Self
    where
        F: Fn(Value) -> Result<(), TransportError> + Send + Sync + 'static,
    {
        Self {
            outbound: Arc::new(outbound),
            inbox: Arc::new(Inbox::default()),
        }
    }

    /// Feed one inbound value to the registered router.
    ///
    /// Errors from the router (unrecognized packets, missing capabilities)
    /// are returned to the caller of `deliver`.
    pub fn deliver(&self, value: Value) -> Result<(), RpcError> {
        self.inbox.deliver(value)
    }

    /// Feed one inbound JSON text frame.
    pub fn deliver_str(&self, frame: &str) -> Result<(), RpcError> {
        let value = codec::decode_line(frame)?;
        self.deliver(value)
    }
}

impl fmt::Debug for CallbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTransport").finish_non_exhaustive()
    }
}

impl Transport for CallbackTransport {
    fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        let value = packet.to_value()?;
        (self.outbound)(value)
    }

    fn register_handler(&self, router: PacketRouter) {
        self.inbox.register(router);
    }

    fn unregister_handler(&self) {
        self.inbox.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_send_hands_structured_value_to_closure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let transport = CallbackTransport::new(move |value| {
            sink.lock().push(value);
            Ok(())
        });

        transport.send(&Packet::message("resize", json!({"w": 10}))).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], json!({"type": "message", "id": "resize", "payload": {"w": 10}}));
    }

    #[test]
    fn test_closure_error_propagates() {
        let transport = CallbackTransport::new(|_| Err(TransportError::Callback("window gone".into())));
        let err = transport
            .send(&Packet::message("x", Value::Null))
            .unwrap_err();
        assert!(err.to_string().contains("window gone"));
    }

    #[test]
    fn test_deliver_str_rejects_garbage() {
        let transport = CallbackTransport::new(|_| Ok(()));
        assert!(matches!(
            transport.deliver_str("{{{"),
            Err(RpcError::UnrecognizedPacket(_))
        ));
    }
}
