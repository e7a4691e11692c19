//! Observation hooks.
//!
//! Hooks see traffic and anomalies; they never change routing.

use std::fmt;
use std::sync::Arc;

use bridge_protocol::Packet;

pub type PacketHook = Arc<dyn Fn(&Packet) + Send + Sync>;
pub type DiagnosticHook = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Conditions the engine tolerates silently but a caller may want to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A response arrived for an id with no pending entry (late or unknown).
    UnroutableResponse { id: u64 },
    /// A message listener panicked; remaining listeners still ran.
    ListenerPanicked { name: String },
    /// A handled request's response could not be sent back.
    ResponseSendFailed { id: u64, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnroutableResponse { id } => {
                write!(f, "dropped response for unknown request id {}", id)
            }
            Diagnostic::ListenerPanicked { name } => {
                write!(f, "listener for message `{}` panicked", name)
            }
            Diagnostic::ResponseSendFailed { id, reason } => {
                write!(f, "could not send response {}: {}", id, reason)
            }
        }
    }
}

/// Optional callbacks attached at construction time.
#[derive(Clone, Default)]
pub struct DebugHooks {
    on_send: Option<PacketHook>,
    on_receive: Option<PacketHook>,
    on_diagnostic: Option<DiagnosticHook>,
}

impl DebugHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with every packet just before it is handed to the transport.
    pub fn on_send<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.on_send = Some(Arc::new(hook));
        self
    }

    /// Called with every classified inbound packet before it is routed.
    pub fn on_receive<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.on_receive = Some(Arc::new(hook));
        self
    }

    pub fn on_diagnostic<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        self.on_diagnostic = Some(Arc::new(hook));
        self
    }

    pub(crate) fn sent(&self, packet: &Packet) {
        if let Some(hook) = &self.on_send {
            hook(packet);
        }
    }

    pub(crate) fn received(&self, packet: &Packet) {
        if let Some(hook) = &self.on_receive {
            hook(packet);
        }
    }

    pub(crate) fn diagnose(&self, diagnostic: Diagnostic) {
        if let Some(hook) = &self.on_diagnostic {
            hook(&diagnostic);
        }
    }
}

impl fmt::Debug for DebugHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugHooks")
            .field("on_send", &self.on_send.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_diagnostic", &self.on_diagnostic.is_some())
            .finish()
    }
}
