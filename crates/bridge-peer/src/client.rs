//! Typed host-side client for the peer service.

use bridge_rpc::schema::{define_side, SideConfig, SideRpc};
use bridge_rpc::{ListenerId, MessageDef, RpcConfig, RpcError, Side, Transport};
use serde_json::Value;
use tracing::warn;

use crate::api::{
    peer_contract, Add, AddParams, Echo, Log, LogPayload, Notice, NoticePayload, Notify, NotifyParams,
    PeerStats, Ping, Sleep, SleepParams, Stats,
};

/// The host's side of the peer contract, one method per declaration.
#[derive(Clone)]
pub struct PeerClient {
    side: SideRpc,
}

impl PeerClient {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let side = define_side(
            Side::A,
            &peer_contract(),
            SideConfig::new()
                .max_request_time(config.max_request_time)
                .max_request_id(config.max_request_id),
        )?;
        Ok(Self { side })
    }

    pub fn connect<T: Transport + 'static>(&self, transport: T) {
        self.side.set_transport(transport);
    }

    pub fn side(&self) -> &SideRpc {
        &self.side
    }

    pub async fn ping(&self) -> Result<String, RpcError> {
        self.side.request_as::<Ping>(&()).await
    }

    pub async fn echo(&self, value: Value) -> Result<Value, RpcError> {
        self.side.request_as::<Echo>(&value).await
    }

    pub async fn add(&self, x: i64, y: i64) -> Result<i64, RpcError> {
        self.side.request_as::<Add>(&AddParams { x, y }).await
    }

    pub async fn sleep(&self, ms: u64) -> Result<(), RpcError> {
        self.side.request_as::<Sleep>(&SleepParams { ms }).await
    }

    pub async fn notify(&self, text: impl Into<String>) -> Result<(), RpcError> {
        self.side
            .request_as::<Notify>(&NotifyParams { text: text.into() })
            .await
    }

    pub async fn stats(&self) -> Result<PeerStats, RpcError> {
        self.side.request_as::<Stats>(&()).await
    }

    pub fn log(&self, msg: impl Into<String>) -> Result<(), RpcError> {
        self.side.emit_as::<Log>(&LogPayload { msg: msg.into() })
    }

    pub fn on_notice<F>(&self, listener: F) -> Result<ListenerId, RpcError>
    where
        F: Fn(NoticePayload) + Send + Sync + 'static,
    {
        self.side.subscribe(Notice::NAME, move |payload: &Value| {
            match serde_json::from_value::<NoticePayload>(payload.clone()) {
                Ok(notice) => listener(notice),
                Err(e) => warn!(error = %e, "malformed notice"),
            }
        })
    }
}
