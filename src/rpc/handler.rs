//! Request handlers
//!
//! An instance answers inbound requests with either a single function that
//! sees every method name, or a [`MethodMap`] of per-method functions with an
//! optional fallback for names not in the map.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::typed::RequestDef;
use crate::error::HandlerError;

/// Boxed future produced by a handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

type MethodFn = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;
type CatchAllFn = Arc<dyn Fn(String, Value) -> HandlerFuture + Send + Sync>;

/// The user-supplied answer to inbound requests.
#[derive(Clone)]
pub enum RequestHandler {
    /// One function receiving `(method, params)` for every request.
    Function(CatchAllFn),
    /// Per-method functions plus an optional fallback.
    Methods(MethodMap),
}

impl RequestHandler {
    pub fn from_fn<F, Fut>(handler: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        RequestHandler::Function(Arc::new(move |method: String, params: Value| -> HandlerFuture {
            Box::pin(handler(method, params))
        }))
    }

    pub(crate) fn handle(&self, method: String, params: Value) -> HandlerFuture {
        match self {
            RequestHandler::Function(handler) => handler(method, params),
            RequestHandler::Methods(map) => map.handle(method, params),
        }
    }
}

impl From<MethodMap> for RequestHandler {
    fn from(map: MethodMap) -> Self {
        RequestHandler::Methods(map)
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestHandler::Function(_) => f.write_str("RequestHandler::Function"),
            RequestHandler::Methods(map) => f.debug_tuple("RequestHandler::Methods").field(map).finish(),
        }
    }
}

/// Name-indexed request handlers.
#[derive(Clone, Default)]
pub struct MethodMap {
    methods: HashMap<String, MethodFn>,
    fallback: Option<CatchAllFn>,
}

impl MethodMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle `name` with a function over raw JSON params.
    pub fn method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        let handler: MethodFn = Arc::new(move |params: Value| -> HandlerFuture {
            Box::pin(handler(params))
        });
        self.methods.insert(name.into(), handler);
        self
    }

    /// Handle `name` with a function over deserialized params.
    ///
    /// Params that fail to deserialize produce a failed response without
    /// calling `handler`.
    pub fn typed<P, R, F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.method(name, move |params| invoke_typed(handler.clone(), params))
    }

    /// Handle the request declared by `R`.
    pub fn handle_as<R, F, Fut>(self, handler: F) -> Self
    where
        R: RequestDef,
        F: Fn(R::Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R::Response, HandlerError>> + Send + 'static,
    {
        self.typed(R::METHOD, handler)
    }

    /// Catch every method not in the map; receives `(method, params)`.
    pub fn fallback<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |method: String, params: Value| -> HandlerFuture {
            Box::pin(handler(method, params))
        }));
        self
    }

    /// Layer `other` on top of this map. Its entries and fallback win.
    pub fn extend(&mut self, other: MethodMap) {
        self.methods.extend(other.methods);
        if other.fallback.is_some() {
            self.fallback = other.fallback;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Method names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.fallback.is_none()
    }

    pub(crate) fn handle(&self, method: String, params: Value) -> HandlerFuture {
        if let Some(handler) = self.methods.get(&method) {
            return handler(params);
        }
        if let Some(fallback) = &self.fallback {
            return fallback(method, params);
        }
        Box::pin(async move { Err(HandlerError::no_handler(&method)) })
    }
}

async fn invoke_typed<P, R, F, Fut>(handler: Arc<F>, params: Value) -> Result<Value, HandlerError>
where
    P: DeserializeOwned,
    R: Serialize,
    F: Fn(P) -> Fut,
    Fut: Future<Output = Result<R, HandlerError>>,
{
    let params: P = serde_json::from_value(params)?;
    let result = handler(params).await?;
    serde_json::to_value(result)
        .map_err(|e| HandlerError::new(format!("could not encode result: {}", e)))
}

impl fmt::Debug for MethodMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMap")
            .field("methods", &self.names())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
