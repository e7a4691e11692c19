//! RPC Instance
//!
//! One stateful engine per logical channel. It owns the current transport,
//! the request handler, the pending-request table with its id counter, and
//! the message listener tables. Only the transport and the handler are
//! replaceable; the tables survive every transport swap.
//!
//! All state sits behind short-lived locks. No lock is held while user
//! code or a transport runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use bridge_protocol::{Packet, DEFAULT_MAX_REQUEST_ID, WILDCARD};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::debug;

use crate::config::RpcConfig;
use crate::error::RpcError;
use crate::timeout::MaxRequestTime;
use crate::transport::{self, Capability, DetachedTransport, Transport};

mod handler;
mod hooks;
mod listeners;
mod pending;
mod router;
mod typed;

pub use handler::{HandlerFuture, MethodMap, RequestHandler};
pub use hooks::{DebugHooks, Diagnostic, DiagnosticHook, PacketHook};
pub use listeners::{ListenerId, MessageListener, WildcardListener};
pub use pending::ResponseFuture;
pub use router::PacketRouter;
pub use typed::{MessageDef, RequestDef};

use listeners::ListenerTable;
use pending::{RequestState, SharedRequests};

/// Construction options for [`RpcInstance`].
#[derive(Clone)]
pub struct RpcOptions {
    transport: Option<Arc<dyn Transport>>,
    request_handler: Option<RequestHandler>,
    max_request_time: MaxRequestTime,
    max_request_id: u64,
    debug_hooks: DebugHooks,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            transport: None,
            request_handler: None,
            max_request_time: MaxRequestTime::default(),
            max_request_id: DEFAULT_MAX_REQUEST_ID,
            debug_hooks: DebugHooks::default(),
        }
    }
}

impl std::fmt::Debug for RpcOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcOptions")
            .field("transport", &self.transport.is_some())
            .field("request_handler", &self.request_handler)
            .field("max_request_time", &self.max_request_time)
            .field("max_request_id", &self.max_request_id)
            .field("debug_hooks", &self.debug_hooks)
            .finish()
    }
}

impl RpcOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RpcConfig) -> Self {
        Self::new()
            .max_request_time(config.max_request_time)
            .max_request_id(config.max_request_id)
    }

    pub fn transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn request_handler(mut self, handler: impl Into<RequestHandler>) -> Self {
        self.request_handler = Some(handler.into());
        self
    }

    pub fn max_request_time(mut self, limit: MaxRequestTime) -> Self {
        self.max_request_time = limit;
        self
    }

    /// Largest id handed out before the counter wraps to zero.
    pub fn max_request_id(mut self, max: u64) -> Self {
        self.max_request_id = max;
        self
    }

    pub fn debug_hooks(mut self, hooks: DebugHooks) -> Self {
        self.debug_hooks = hooks;
        self
    }
}

struct Shared {
    transport: Mutex<Arc<dyn Transport>>,
    /// Held for a whole transport swap. Reentrant so a listener run by the
    /// backlog flush on registration may swap again.
    swap: ReentrantMutex<()>,
    request_handler: Mutex<Option<RequestHandler>>,
    requests: SharedRequests,
    listeners: Mutex<ListenerTable>,
    max_request_time: MaxRequestTime,
    hooks: DebugHooks,
    /// Inbound requests whose response has not been sent yet.
    active_handlers: AtomicUsize,
    handlers_idle: Notify,
    /// Runtime captured at construction, for transports that deliver from
    /// threads outside any runtime.
    runtime: Option<Handle>,
}

impl Shared {
    fn current_transport(&self) -> Arc<dyn Transport> {
        self.transport.lock().clone()
    }

    fn runtime(&self) -> Result<Handle, RpcError> {
        Handle::try_current()
            .ok()
            .or_else(|| self.runtime.clone())
            .ok_or(RpcError::NoRuntime)
    }

    fn handler_started(&self) {
        self.active_handlers.fetch_add(1, Ordering::SeqCst);
    }

    fn handler_finished(&self) {
        if self.active_handlers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.handlers_idle.notify_waiters();
        }
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), RpcError> {
        let transport = self.current_transport();
        self.hooks.sent(packet);
        transport.send(packet)?;
        Ok(())
    }
}

/// Handle to an RPC instance. Clones share the same engine.
#[derive(Clone)]
pub struct RpcInstance {
    shared: Arc<Shared>,
}

/// Non-owning handle, for handlers that need to call back into their own
/// instance without keeping it alive.
#[derive(Clone)]
pub struct WeakRpc {
    shared: Weak<Shared>,
}

impl WeakRpc {
    pub fn upgrade(&self) -> Option<RpcInstance> {
        self.shared.upgrade().map(|shared| RpcInstance { shared })
    }
}

impl RpcInstance {
    pub fn new(options: RpcOptions) -> Self {
        let shared = Arc::new(Shared {
            transport: Mutex::new(Arc::new(DetachedTransport)),
            swap: ReentrantMutex::new(()),
            request_handler: Mutex::new(options.request_handler),
            requests: Arc::new(Mutex::new(RequestState::new(options.max_request_id))),
            listeners: Mutex::new(ListenerTable::default()),
            max_request_time: options.max_request_time,
            hooks: options.debug_hooks,
            active_handlers: AtomicUsize::new(0),
            handlers_idle: Notify::new(),
            runtime: Handle::try_current().ok(),
        });

        let rpc = Self { shared };
        if let Some(transport) = options.transport {
            rpc.set_shared_transport(transport);
        }
        rpc
    }

    pub fn set_transport<T: Transport + 'static>(&self, transport: T) {
        self.set_shared_transport(Arc::new(transport));
    }

    /// Replace the current transport.
    ///
    /// The old transport's router is unregistered before the new one is
    /// registered. Requests already sent over the old transport stay pending.
    pub fn set_shared_transport(&self, transport: Arc<dyn Transport>) {
        let _swap = self.shared.swap.lock();
        let previous = std::mem::replace(&mut *self.shared.transport.lock(), transport.clone());

        if previous.provides(Capability::UnregisterHandler) {
            previous.unregister_handler();
        }
        if transport.provides(Capability::RegisterHandler) {
            transport.register_handler(self.router());
        }
        debug!("transport replaced");
    }

    pub fn set_request_handler(&self, handler: impl Into<RequestHandler>) {
        *self.shared.request_handler.lock() = Some(handler.into());
    }

    /// Issue a request and return a future for its outcome.
    ///
    /// Fails immediately if the transport cannot send.
    pub fn call(&self, method: &str, params: Value) -> Result<ResponseFuture, RpcError> {
        let transport = self.shared.current_transport();
        transport::require(transport.as_ref(), &[Capability::Send], "make requests")?;

        let timer = match self.shared.max_request_time.as_duration() {
            Some(after) => Some((self.shared.runtime()?, after)),
            None => None,
        };

        let future = pending::register(&self.shared.requests, method, timer);
        let packet = Packet::request(future.id(), method, params);
        debug!(id = future.id(), method, "sending request");

        self.shared.hooks.sent(&packet);
        if let Err(e) = transport.send(&packet) {
            pending::discard(&self.shared.requests, &future);
            return Err(e.into());
        }
        Ok(future)
    }

    /// Issue a request and wait for its outcome.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call(method, params)?.await
    }

    /// Send a fire-and-forget message.
    pub fn emit(&self, name: &str, payload: Value) -> Result<(), RpcError> {
        let transport = self.shared.current_transport();
        transport::require(transport.as_ref(), &[Capability::Send], "send messages")?;

        let packet = Packet::message(name, payload);
        self.shared.hooks.sent(&packet);
        transport.send(&packet)?;
        Ok(())
    }

    /// Same as [`emit`](Self::emit).
    pub fn send(&self, name: &str, payload: Value) -> Result<(), RpcError> {
        self.emit(name, payload)
    }

    /// Listen for messages named `name`.
    ///
    /// `"*"` is refused: a wildcard listener must see the message name, so it
    /// goes through [`subscribe_all`](Self::subscribe_all).
    pub fn subscribe<F>(&self, name: &str, listener: F) -> Result<ListenerId, RpcError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if name == WILDCARD {
            return Err(RpcError::WildcardSubscription);
        }
        self.require_receive()?;
        Ok(self.shared.listeners.lock().add_named(name, Arc::new(listener)))
    }

    /// Listen for every message (`"*"`), receiving `(name, payload)`.
    pub fn subscribe_all<F>(&self, listener: F) -> Result<ListenerId, RpcError>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.require_receive()?;
        Ok(self.shared.listeners.lock().add_wildcard(Arc::new(listener)))
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.lock().remove(id)
    }

    fn require_receive(&self) -> Result<(), RpcError> {
        let transport = self.shared.current_transport();
        transport::require(
            transport.as_ref(),
            &[Capability::RegisterHandler],
            "register message listeners",
        )
    }

    /// Router bound to this instance, for transports to call.
    pub fn router(&self) -> PacketRouter {
        PacketRouter::new(Arc::downgrade(&self.shared))
    }

    /// Number of requests awaiting a response or timeout.
    pub fn pending_requests(&self) -> usize {
        self.shared.requests.lock().len()
    }

    /// Number of inbound requests still being handled.
    pub fn active_handlers(&self) -> usize {
        self.shared.active_handlers.load(Ordering::SeqCst)
    }

    /// Wait until every inbound request received so far has been answered.
    pub async fn drain_handlers(&self) {
        loop {
            let idle = self.shared.handlers_idle.notified();
            if self.active_handlers() == 0 {
                return;
            }
            idle.await;
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    pub fn max_request_time(&self) -> MaxRequestTime {
        self.shared.max_request_time
    }

    pub fn downgrade(&self) -> WeakRpc {
        WeakRpc {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl std::fmt::Debug for RpcInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcInstance")
            .field("max_request_time", &self.shared.max_request_time)
            .field("pending_requests", &self.pending_requests())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StubTransport, TransportError};
    use serde_json::json;

    #[test]
    fn test_detached_instance_fails_fast() {
        let rpc = RpcInstance::new(RpcOptions::new());

        let err = rpc.call("ping", Value::Null).unwrap_err();
        assert!(err.to_string().contains("cannot make requests"));
        assert!(err.to_string().contains("`send`"));

        let err = rpc.emit("tick", Value::Null).unwrap_err();
        assert!(err.to_string().contains("cannot send messages"));

        let err = rpc.subscribe("tick", |_: &Value| {}).unwrap_err();
        assert!(err.to_string().contains("`registerHandler`"));
    }

    #[test]
    fn test_stub_allows_listeners_but_not_sends() {
        let rpc = RpcInstance::new(RpcOptions::new().transport(StubTransport));

        assert!(rpc.subscribe("tick", |_: &Value| {}).is_ok());
        assert!(rpc.subscribe_all(|_: &str, _: &Value| {}).is_ok());
        assert_eq!(rpc.listener_count(), 2);
        assert!(matches!(
            rpc.emit("tick", Value::Null),
            Err(RpcError::MissingCapability { .. })
        ));
    }

    struct FailingSend;

    impl Transport for FailingSend {
        fn send(&self, _packet: &Packet) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }

        fn register_handler(&self, _router: PacketRouter) {}
    }

    #[tokio::test]
    async fn test_failed_send_leaves_no_pending_entry() {
        let rpc = RpcInstance::new(RpcOptions::new().transport(FailingSend));

        let err = rpc.call("ping", json!({})).unwrap_err();
        assert!(matches!(err, RpcError::Transport(TransportError::Closed)));
        assert_eq!(rpc.pending_requests(), 0);
    }

    #[test]
    fn test_infinite_limit_needs_no_runtime() {
        struct Sink;
        impl Transport for Sink {
            fn send(&self, _packet: &Packet) -> Result<(), TransportError> {
                Ok(())
            }
            fn register_handler(&self, _router: PacketRouter) {}
        }

        let rpc = RpcInstance::new(
            RpcOptions::new()
                .transport(Sink)
                .max_request_time(MaxRequestTime::Infinite),
        );
        let future = rpc.call("ping", Value::Null).unwrap();
        assert_eq!(future.id(), 1);
        assert_eq!(rpc.pending_requests(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let rpc = RpcInstance::new(RpcOptions::new().transport(StubTransport));
        let id = rpc.subscribe_all(|_: &str, _: &Value| {}).unwrap();
        assert!(rpc.unsubscribe(id));
        assert!(!rpc.unsubscribe(id));
    }

    #[test]
    fn test_wildcard_name_refused_by_subscribe() {
        let rpc = RpcInstance::new(RpcOptions::new().transport(StubTransport));
        let err = rpc.subscribe("*", |_: &Value| {}).unwrap_err();
        assert!(matches!(err, RpcError::WildcardSubscription));
        assert!(err.to_string().contains("subscribe_all"));
        assert_eq!(rpc.listener_count(), 0);
    }

    /// Counts the routers currently registered on it.
    #[derive(Default)]
    struct Tracking {
        registered: std::sync::atomic::AtomicIsize,
        sent: std::sync::atomic::AtomicUsize,
    }

    impl Transport for Tracking {
        fn send(&self, _packet: &Packet) -> Result<(), TransportError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn register_handler(&self, _router: PacketRouter) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }

        fn unregister_handler(&self) {
            self.registered.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_concurrent_swaps_leave_only_current_registered() {
        let rpc = RpcInstance::new(RpcOptions::new());
        let all: Mutex<Vec<Arc<Tracking>>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let transport = Arc::new(Tracking::default());
                        all.lock().push(transport.clone());
                        rpc.set_shared_transport(transport);
                    }
                });
            }
        });

        let all = all.into_inner();
        let registered: Vec<&Arc<Tracking>> = all
            .iter()
            .filter(|t| t.registered.load(Ordering::SeqCst) != 0)
            .collect();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].registered.load(Ordering::SeqCst), 1);

        rpc.emit("tick", Value::Null).unwrap();
        assert_eq!(registered[0].sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_router_detaches_with_instance() {
        let rpc = RpcInstance::new(RpcOptions::new());
        let router = rpc.router();
        assert!(router.is_attached());
        drop(rpc);
        assert!(!router.is_attached());
        assert!(router.route(json!({"type": "message", "id": "late"})).is_ok());
    }
}
