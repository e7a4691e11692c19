//! Bridge RPC - multiplexed request/response and messaging over any channel
//!
//! Turns a byte stream or message-passing primitive between two processes
//! into concurrent requests with timeouts, fire-and-forget messages and
//! name-based subscriptions. The engine is transport-agnostic; concrete
//! adapters for in-memory pairs, async byte streams and callback bridges
//! live in [`transport`].

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod rpc;
pub mod schema;
pub mod timeout;
pub mod transport;

pub use bridge_protocol as protocol;

pub use config::{EffectiveConfig, PeerConfig, RpcConfig};
pub use error::{FailureKind, HandlerError, RpcError};
pub use registry::{BroadcastReport, ChannelId, ChannelRegistry};
pub use rpc::{
    DebugHooks, Diagnostic, ListenerId, MessageDef, MethodMap, PacketRouter, RequestDef,
    RequestHandler, ResponseFuture, RpcInstance, RpcOptions, WeakRpc,
};
pub use schema::{define_side, Contract, MessageHandlers, Schema, SchemaPair, Side, SideConfig, SideRpc};
pub use timeout::MaxRequestTime;
pub use transport::{
    CallbackTransport, Capability, LoopbackTransport, StreamTransport, StubTransport, Transport,
    TransportError,
};
