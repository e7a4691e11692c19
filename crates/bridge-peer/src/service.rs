//! Built-in peer service
//!
//! Request handlers for the peer side of [`peer_contract`], plus a `log`
//! listener. Counters are exposed through the `stats` request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bridge_rpc::schema::{define_side, MessageHandlers, SideConfig, SideRpc};
use bridge_rpc::{HandlerError, MethodMap, RpcError, Side, WeakRpc};
use serde_json::Value;
use tracing::info;

use crate::api::{
    peer_contract, Add, AddParams, Echo, Log, LogPayload, Notice, NoticePayload, Notify, NotifyParams,
    PeerStats, Ping, Sleep, SleepParams, Stats,
};
use crate::config::PeerServiceConfig;

#[derive(Default)]
struct Counters {
    logs_received: AtomicU64,
    notices_sent: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PeerStats {
        PeerStats {
            logs_received: self.logs_received.load(Ordering::SeqCst),
            notices_sent: self.notices_sent.load(Ordering::SeqCst),
        }
    }
}

/// Build the peer's side of the contract, not yet attached to a transport.
pub fn build_peer(config: &PeerServiceConfig) -> Result<SideRpc, RpcError> {
    let counters = Arc::new(Counters::default());
    // Filled in once the instance exists; `notify` emits through it.
    let own: Arc<OnceLock<WeakRpc>> = Arc::new(OnceLock::new());

    let side = define_side(
        Side::B,
        &peer_contract(),
        SideConfig::new()
            .max_request_time(config.rpc.max_request_time)
            .max_request_id(config.rpc.max_request_id)
            .requests(handlers(config.max_sleep, counters.clone(), own.clone()))
            .messages(MessageHandlers::new().on_as::<Log, _>({
                let counters = counters.clone();
                move |payload: LogPayload| {
                    counters.logs_received.fetch_add(1, Ordering::SeqCst);
                    info!(msg = %payload.msg, "host log");
                }
            })),
    )?;

    let _ = own.set(side.rpc().downgrade());
    Ok(side)
}

fn handlers(max_sleep: Duration, counters: Arc<Counters>, own: Arc<OnceLock<WeakRpc>>) -> MethodMap {
    MethodMap::new()
        .handle_as::<Ping, _, _>(|_: ()| async { Ok::<_, HandlerError>("pong".to_string()) })
        .handle_as::<Echo, _, _>(|params: Value| async move { Ok::<_, HandlerError>(params) })
        .handle_as::<Add, _, _>(|AddParams { x, y }| async move {
            x.checked_add(y)
                .ok_or_else(|| HandlerError::new(format!("{} + {} overflows", x, y)))
        })
        .handle_as::<Sleep, _, _>(move |SleepParams { ms }| async move {
            let wanted = Duration::from_millis(ms);
            if wanted > max_sleep {
                return Err(HandlerError::new(format!(
                    "sleep of {}ms exceeds the limit of {}ms",
                    ms,
                    max_sleep.as_millis()
                )));
            }
            tokio::time::sleep(wanted).await;
            Ok::<_, HandlerError>(())
        })
        .handle_as::<Notify, _, _>({
            let counters = counters.clone();
            move |NotifyParams { text }| {
                let counters = counters.clone();
                let own = own.clone();
                async move {
                    let rpc = own
                        .get()
                        .and_then(WeakRpc::upgrade)
                        .ok_or_else(|| HandlerError::new("peer is shutting down"))?;
                    rpc.emit_as::<Notice>(&NoticePayload { text })?;
                    counters.notices_sent.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HandlerError>(())
                }
            }
        })
        .handle_as::<Stats, _, _>(move |_: ()| {
            let stats = counters.snapshot();
            async move { Ok::<_, HandlerError>(stats) }
        })
}
