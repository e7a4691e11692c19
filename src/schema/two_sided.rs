//! Building one side of a two-sided channel.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bridge_protocol::{DEFAULT_MAX_REQUEST_ID, WILDCARD};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Contract, SchemaPair, Side};
use crate::error::RpcError;
use crate::rpc::{
    DebugHooks, ListenerId, MessageDef, MessageListener, MethodMap, RequestDef, ResponseFuture,
    RpcInstance, RpcOptions, WildcardListener,
};
use crate::timeout::MaxRequestTime;
use crate::transport::{StubTransport, Transport};

/// Handlers for inbound messages: one per name plus an optional catch-all.
#[derive(Clone, Default)]
pub struct MessageHandlers {
    named: HashMap<String, MessageListener>,
    wildcard: Option<WildcardListener>,
}

impl MessageHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.named.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn on_as<M, F>(self, handler: F) -> Self
    where
        M: MessageDef,
        F: Fn(M::Payload) + Send + Sync + 'static,
    {
        self.on(M::NAME, move |payload: &Value| {
            match serde_json::from_value::<M::Payload>(payload.clone()) {
                Ok(decoded) => handler(decoded),
                Err(e) => warn!(message = M::NAME, error = %e, "could not decode message payload"),
            }
        })
    }

    /// Receives `(name, payload)` for every message, before the named handler.
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.wildcard = Some(Arc::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.wildcard.is_none()
    }

    /// Collapse into one wildcard listener that keeps the two-phase order.
    fn into_listener(self) -> impl Fn(&str, &Value) + Send + Sync + 'static {
        let MessageHandlers { named, wildcard } = self;
        move |name: &str, payload: &Value| {
            if let Some(wildcard) = &wildcard {
                if catch_unwind(AssertUnwindSafe(|| wildcard(name, payload))).is_err() {
                    warn!(message = name, "wildcard message handler panicked");
                }
            }
            if let Some(handler) = named.get(name) {
                handler(payload);
            }
        }
    }
}

/// Everything one side brings to a contract.
#[derive(Clone)]
pub struct SideConfig {
    pub max_request_time: MaxRequestTime,
    pub max_request_id: u64,
    /// Handlers for the requests this side declares.
    pub requests: MethodMap,
    pub messages: MessageHandlers,
    /// Layered over `requests`; not checked against the contract.
    pub extra_request_handlers: MethodMap,
    pub debug_hooks: DebugHooks,
}

impl Default for SideConfig {
    fn default() -> Self {
        Self {
            max_request_time: MaxRequestTime::default(),
            max_request_id: DEFAULT_MAX_REQUEST_ID,
            requests: MethodMap::new(),
            messages: MessageHandlers::new(),
            extra_request_handlers: MethodMap::new(),
            debug_hooks: DebugHooks::default(),
        }
    }
}

impl SideConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_request_time(mut self, limit: MaxRequestTime) -> Self {
        self.max_request_time = limit;
        self
    }

    pub fn max_request_id(mut self, max: u64) -> Self {
        self.max_request_id = max;
        self
    }

    pub fn requests(mut self, handlers: MethodMap) -> Self {
        self.requests = handlers;
        self
    }

    pub fn messages(mut self, handlers: MessageHandlers) -> Self {
        self.messages = handlers;
        self
    }

    pub fn extra_request_handlers(mut self, handlers: MethodMap) -> Self {
        self.extra_request_handlers = handlers;
        self
    }

    pub fn debug_hooks(mut self, hooks: DebugHooks) -> Self {
        self.debug_hooks = hooks;
        self
    }
}

/// Build the instance for `side`.
///
/// The instance starts on a [`StubTransport`], so message handlers are
/// registered immediately; attach the real channel with
/// [`SideRpc::set_transport`].
pub fn define_side(side: Side, contract: &Contract, config: SideConfig) -> Result<SideRpc, RpcError> {
    let schema = contract.pair_for(side);

    for name in config.requests.names() {
        if !schema.local.has_request(name) {
            return Err(RpcError::Undeclared {
                direction: "local request",
                name: name.to_string(),
            });
        }
    }
    for name in config.messages.named.keys() {
        if !schema.local.has_message(name) {
            return Err(RpcError::Undeclared {
                direction: "local message",
                name: name.clone(),
            });
        }
    }

    let mut handlers = config.requests;
    handlers.extend(config.extra_request_handlers);

    let rpc = RpcInstance::new(
        RpcOptions::new()
            .transport(StubTransport)
            .request_handler(handlers)
            .max_request_time(config.max_request_time)
            .max_request_id(config.max_request_id)
            .debug_hooks(config.debug_hooks),
    );

    if !config.messages.is_empty() {
        rpc.subscribe_all(config.messages.into_listener())?;
    }

    debug!(%side, "side defined");
    Ok(SideRpc { side, schema, rpc })
}

/// An instance bound to one side of a contract.
///
/// Names outside the contract are rejected before anything is sent.
#[derive(Clone)]
pub struct SideRpc {
    side: Side,
    schema: SchemaPair,
    rpc: RpcInstance,
}

impl SideRpc {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn schema(&self) -> &SchemaPair {
        &self.schema
    }

    /// The untyped engine underneath, without contract checks.
    pub fn rpc(&self) -> &RpcInstance {
        &self.rpc
    }

    pub fn set_transport<T: Transport + 'static>(&self, transport: T) {
        self.rpc.set_transport(transport);
    }

    pub fn call(&self, method: &str, params: Value) -> Result<ResponseFuture, RpcError> {
        if !self.schema.remote.has_request(method) {
            return Err(RpcError::Undeclared {
                direction: "remote request",
                name: method.to_string(),
            });
        }
        self.rpc.call(method, params)
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call(method, params)?.await
    }

    pub async fn request_as<R: RequestDef>(&self, params: &R::Params) -> Result<R::Response, RpcError> {
        let params = serde_json::to_value(params)?;
        let value = self.request(R::METHOD, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn emit(&self, name: &str, payload: Value) -> Result<(), RpcError> {
        if !self.schema.remote.has_message(name) {
            return Err(RpcError::Undeclared {
                direction: "outbound message",
                name: name.to_string(),
            });
        }
        self.rpc.emit(name, payload)
    }

    pub fn emit_as<M: MessageDef>(&self, payload: &M::Payload) -> Result<(), RpcError> {
        self.emit(M::NAME, serde_json::to_value(payload)?)
    }

    pub fn send(&self, name: &str, payload: Value) -> Result<(), RpcError> {
        self.emit(name, payload)
    }

    pub fn send_as<M: MessageDef>(&self, payload: &M::Payload) -> Result<(), RpcError> {
        self.emit_as::<M>(payload)
    }

    /// Listen for a declared inbound message. `"*"` is refused as in
    /// [`RpcInstance::subscribe`]; use [`subscribe_all`](Self::subscribe_all).
    pub fn subscribe<F>(&self, name: &str, listener: F) -> Result<ListenerId, RpcError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if name == WILDCARD {
            return Err(RpcError::WildcardSubscription);
        }
        if !self.schema.local.has_message(name) {
            return Err(RpcError::Undeclared {
                direction: "inbound message",
                name: name.to_string(),
            });
        }
        self.rpc.subscribe(name, listener)
    }

    /// Listen for every inbound message, receiving `(name, payload)`.
    pub fn subscribe_all<F>(&self, listener: F) -> Result<ListenerId, RpcError>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.rpc.subscribe_all(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.rpc.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::schema::Schema;
    use serde_json::json;

    fn contract() -> Contract {
        Contract::new(
            Schema::new().with_request("ping").with_message("tick"),
            Schema::new().with_request("pong").with_message("tock"),
        )
    }

    #[test]
    fn test_unanswerable_request_handler_rejected() {
        let config = SideConfig::new().requests(
            MethodMap::new().method("pong", |_| async { Ok::<_, HandlerError>(Value::Null) }),
        );
        let err = define_side(Side::A, &contract(), config).err().unwrap();
        assert!(matches!(err, RpcError::Undeclared { ref name, .. } if name == "pong"));
    }

    #[test]
    fn test_handler_for_own_message_rejected() {
        let config = SideConfig::new().messages(MessageHandlers::new().on("tick", |_: &Value| {}));
        assert!(define_side(Side::A, &contract(), config).is_err());
    }

    #[test]
    fn test_extra_handlers_are_not_checked() {
        let config = SideConfig::new().extra_request_handlers(
            MethodMap::new().method("internal", |_| async { Ok::<_, HandlerError>(Value::Null) }),
        );
        assert!(define_side(Side::A, &contract(), config).is_ok());
    }

    #[test]
    fn test_stub_accepts_listeners_before_transport() {
        let side = define_side(Side::A, &contract(), SideConfig::new()).unwrap();
        assert!(side.subscribe("tock", |_: &Value| {}).is_ok());
        assert!(side.subscribe_all(|_: &str, _: &Value| {}).is_ok());
        assert!(matches!(
            side.subscribe("*", |_: &Value| {}),
            Err(RpcError::WildcardSubscription)
        ));

        // Sending still needs a real transport.
        assert!(matches!(
            side.emit("tick", json!(1)),
            Err(RpcError::MissingCapability { .. })
        ));
    }

    #[test]
    fn test_undeclared_names_rejected_at_call_site() {
        let side = define_side(Side::A, &contract(), SideConfig::new()).unwrap();

        assert!(matches!(side.call("ping", Value::Null), Err(RpcError::Undeclared { .. })));
        assert!(matches!(side.emit("tock", Value::Null), Err(RpcError::Undeclared { .. })));
        assert!(matches!(
            side.subscribe("tick", |_: &Value| {}),
            Err(RpcError::Undeclared { .. })
        ));
    }

    #[test]
    fn test_message_handlers_synthesize_one_subscription() {
        let config = SideConfig::new().messages(
            MessageHandlers::new()
                .on("tock", |_: &Value| {})
                .on_any(|_: &str, _: &Value| {}),
        );
        let side = define_side(Side::A, &contract(), config).unwrap();
        assert_eq!(side.rpc().listener_count(), 1);
    }
}
