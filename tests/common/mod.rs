//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bridge_rpc::protocol::Packet;
use bridge_rpc::{DebugHooks, PacketRouter, RpcError, RpcInstance, RpcOptions, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::Value;

/// Records every outbound packet and lets the test inject inbound ones.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Packet>>>,
    router: Arc<Mutex<Option<PacketRouter>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().clone()
    }

    /// Ids of the requests sent so far, in order.
    pub fn request_ids(&self) -> Vec<u64> {
        self.sent
            .lock()
            .iter()
            .filter_map(|packet| match packet {
                Packet::Request(request) => Some(request.id),
                _ => None,
            })
            .collect()
    }

    /// Feed a raw value through the registered router.
    pub fn inject(&self, value: Value) -> Result<(), RpcError> {
        let router = self.router.lock().clone();
        match router {
            Some(router) => router.route(value),
            None => Ok(()),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.router.lock().is_some()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        self.sent.lock().push(packet.clone());
        Ok(())
    }

    fn register_handler(&self, router: PacketRouter) {
        *self.router.lock() = Some(router);
    }

    fn unregister_handler(&self) {
        self.router.lock().take();
    }
}

/// Hooks that log every packet each way into the returned vectors.
pub fn traffic_hooks() -> (DebugHooks, Arc<Mutex<Vec<Packet>>>, Arc<Mutex<Vec<Packet>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let received = Arc::new(Mutex::new(Vec::new()));
    let hooks = DebugHooks::new()
        .on_send({
            let sent = sent.clone();
            move |packet: &Packet| sent.lock().push(packet.clone())
        })
        .on_receive({
            let received = received.clone();
            move |packet: &Packet| received.lock().push(packet.clone())
        });
    (hooks, sent, received)
}

/// An instance over a recording transport.
pub fn recorded(options: RpcOptions) -> (RpcInstance, RecordingTransport) {
    let transport = RecordingTransport::new();
    let rpc = RpcInstance::new(options.transport(transport.clone()));
    (rpc, transport)
}
