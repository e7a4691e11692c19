//! Inbound packet router
//!
//! The one entry point a transport calls for every inbound packet. It is the
//! only place packet kinds are told apart.

use std::sync::{Arc, Weak};

use bridge_protocol::{Packet, RequestPacket, ResponsePacket};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::hooks::Diagnostic;
use super::{listeners, pending, Shared};
use crate::error::{HandlerError, RpcError};
use crate::transport::{self, Capability};

/// Handle a transport uses to feed inbound packets to an instance.
///
/// Holds the instance weakly; once the instance is gone, routing is a no-op.
#[derive(Clone)]
pub struct PacketRouter {
    shared: Weak<Shared>,
}

impl PacketRouter {
    pub(super) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// Classify and route one decoded value.
    pub fn route(&self, value: Value) -> Result<(), RpcError> {
        let packet = Packet::from_value(value)?;
        self.route_packet(packet)
    }

    pub fn route_packet(&self, packet: Packet) -> Result<(), RpcError> {
        let Some(shared) = self.shared.upgrade() else {
            debug!(kind = %packet.kind(), "instance dropped; ignoring inbound packet");
            return Ok(());
        };

        shared.hooks.received(&packet);
        trace!(kind = %packet.kind(), "routing inbound packet");

        match packet {
            Packet::Request(request) => handle_request(&shared, request),
            Packet::Response(response) => {
                route_response(&shared, response);
                Ok(())
            }
            Packet::Message(message) => {
                let invoked =
                    listeners::dispatch(&shared.listeners, &shared.hooks, &message.name, &message.payload);
                trace!(message = %message.name, invoked, "message dispatched");
                Ok(())
            }
        }
    }

    /// Whether the instance behind this router still exists.
    pub fn is_attached(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

/// Run the request handler in its own task and send exactly one response.
fn handle_request(shared: &Arc<Shared>, request: RequestPacket) -> Result<(), RpcError> {
    let transport = shared.current_transport();
    transport::require(transport.as_ref(), &[Capability::Send], "handle requests")?;
    let runtime = shared.runtime()?;

    let handler = shared.request_handler.lock().clone();
    let instance = Arc::downgrade(shared);
    let RequestPacket { id, method, params } = request;
    debug!(id, %method, "handling inbound request");

    shared.handler_started();
    runtime.clone().spawn(async move {
        let outcome = match handler {
            Some(handler) => {
                let name = method.clone();
                // A panicking handler must still produce a response.
                let invocation = runtime.spawn(async move { handler.handle(name, params).await });
                match invocation.await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_panic() => {
                        warn!(id, %method, "request handler panicked");
                        Err(HandlerError::new(format!("handler for `{}` panicked", method)))
                    }
                    Err(_) => Err(HandlerError::new(format!("handler for `{}` was cancelled", method))),
                }
            }
            None => Err(HandlerError::no_handler(&method)),
        };

        let response = match outcome {
            Ok(payload) => ResponsePacket::success(id, payload),
            Err(e) => {
                debug!(id, %method, error = %e, "request handler failed");
                ResponsePacket::failure(id, e.message())
            }
        };

        if let Some(shared) = instance.upgrade() {
            respond(&shared, response);
            shared.handler_finished();
        }
    });

    Ok(())
}

fn respond(shared: &Shared, response: ResponsePacket) {
    let id = response.id;
    if let Err(e) = shared.send_packet(&Packet::Response(response)) {
        warn!(id, error = %e, "could not send response");
        shared.hooks.diagnose(Diagnostic::ResponseSendFailed {
            id,
            reason: e.to_string(),
        });
    }
}

fn route_response(shared: &Shared, response: ResponsePacket) {
    let id = response.id;
    if !pending::settle(&shared.requests, response) {
        debug!(id, "dropping response for unknown or expired request");
        shared.hooks.diagnose(Diagnostic::UnroutableResponse { id });
    }
}
