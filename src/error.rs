//! Error taxonomy for the RPC engine.
//!
//! Every failure stays local to the instance and its caller:
//! - capability errors surface synchronously at the call site
//! - handler errors travel back as failed responses
//! - timeouts reject the pending future
//! - unrecognized packets fail that one inbound delivery

use std::fmt;
use std::time::Duration;

use bridge_protocol::PacketError;

use crate::transport::{Capability, TransportError};

/// Failure category, used for logging and CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The current transport lacks a required capability (exit code 10)
    Capability = 10,
    /// Writing to or reading from the channel failed (exit code 20)
    Transport = 20,
    /// The remote request handler reported a failure (exit code 30)
    Handler = 30,
    /// No response arrived in time (exit code 40)
    Timeout = 40,
    /// A packet could not be classified or (de)serialized (exit code 50)
    Protocol = 50,
    /// A name outside the declared schema was used (exit code 60)
    Schema = 60,
    /// The instance could not drive the request to completion (exit code 70)
    Internal = 70,
}

/// Errors returned by an RPC instance.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("cannot {action} because the transport does not provide: {}", CapabilityList(.missing))]
    MissingCapability {
        action: &'static str,
        missing: Vec<Capability>,
    },

    /// The remote handler failed; carries its error message verbatim.
    #[error("remote request failed: {0}")]
    Remote(String),

    #[error("RPC request timed out after {after:?} (method `{method}`, id {id})")]
    Timeout {
        id: u64,
        method: String,
        after: Duration,
    },

    #[error("unrecognized packet: {0}")]
    UnrecognizedPacket(#[from] PacketError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("payload (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("`{name}` is not a declared {direction}")]
    Undeclared {
        direction: &'static str,
        name: String,
    },

    #[error("`*` listeners receive the message name; register them with subscribe_all")]
    WildcardSubscription,

    #[error("no Tokio runtime is available to drive the RPC instance")]
    NoRuntime,

    /// The pending entry was dropped without settling, e.g. the instance
    /// went away or a wrapped id replaced it.
    #[error("request {id} was abandoned before it settled")]
    Abandoned { id: u64 },
}

impl RpcError {
    pub(crate) fn missing(action: &'static str, missing: Vec<Capability>) -> Self {
        RpcError::MissingCapability { action, missing }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RpcError::MissingCapability { .. } => FailureKind::Capability,
            RpcError::Remote(_) => FailureKind::Handler,
            RpcError::Timeout { .. } => FailureKind::Timeout,
            RpcError::UnrecognizedPacket(_) => FailureKind::Protocol,
            RpcError::Transport(_) => FailureKind::Transport,
            RpcError::Serialization(_) => FailureKind::Protocol,
            RpcError::Undeclared { .. } | RpcError::WildcardSubscription => FailureKind::Schema,
            RpcError::NoRuntime => FailureKind::Internal,
            RpcError::Abandoned { .. } => FailureKind::Internal,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

struct CapabilityList<'a>(&'a [Capability]);

impl fmt::Display for CapabilityList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, capability) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "`{}`", capability)?;
        }
        Ok(())
    }
}

/// Failure produced by a local request handler.
///
/// Only the message crosses the wire, as the `error` of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn no_handler(method: &str) -> Self {
        Self::new(format!("the requested method has no handler: {}", method))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid params: {}", err))
    }
}

impl From<RpcError> for HandlerError {
    fn from(err: RpcError) -> Self {
        Self::new(err)
    }
}
