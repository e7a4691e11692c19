//! Typed call surface
//!
//! A request or message is declared once as a zero-sized type carrying its
//! wire name and payload types. Wrapper clients then expose one method per
//! declaration on top of the string-keyed engine.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{ListenerId, RpcInstance};
use crate::error::RpcError;

/// A request one side answers.
pub trait RequestDef {
    const METHOD: &'static str;
    type Params: Serialize + DeserializeOwned + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// A fire-and-forget message one side emits.
pub trait MessageDef {
    const NAME: &'static str;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

impl RpcInstance {
    pub async fn request_as<R: RequestDef>(&self, params: &R::Params) -> Result<R::Response, RpcError> {
        let params = serde_json::to_value(params)?;
        let value = self.call(R::METHOD, params)?.await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn emit_as<M: MessageDef>(&self, payload: &M::Payload) -> Result<(), RpcError> {
        let payload = serde_json::to_value(payload)?;
        self.emit(M::NAME, payload)
    }

    pub fn send_as<M: MessageDef>(&self, payload: &M::Payload) -> Result<(), RpcError> {
        self.emit_as::<M>(payload)
    }

    /// Subscribe with a decoded payload. Payloads that fail to decode are
    /// logged and skipped.
    pub fn subscribe_as<M, F>(&self, listener: F) -> Result<ListenerId, RpcError>
    where
        M: MessageDef,
        F: Fn(M::Payload) + Send + Sync + 'static,
    {
        self.subscribe(M::NAME, move |payload: &Value| {
            match serde_json::from_value::<M::Payload>(payload.clone()) {
                Ok(decoded) => listener(decoded),
                Err(e) => warn!(message = M::NAME, error = %e, "could not decode message payload"),
            }
        })
    }
}
