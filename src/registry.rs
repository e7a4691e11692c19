//! Channel registry
//!
//! A coordinator that talks to many child channels (one per embedded
//! content context, say) keeps their instances here and fans messages out
//! by iterating the map. The registry is an ordinary value: whoever needs to
//! broadcast is handed a reference to it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RpcError;
use crate::rpc::RpcInstance;

/// Identifier of one child channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<ChannelId>,
    pub failed: Vec<(ChannelId, RpcError)>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<ChannelId, RpcInstance>,
    next_id: u32,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance under a fresh id.
    pub fn register(&mut self, rpc: RpcInstance) -> ChannelId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            let id = ChannelId(self.next_id);
            if !self.channels.contains_key(&id) {
                self.channels.insert(id, rpc);
                debug!(%id, "channel registered");
                return id;
            }
        }
    }

    /// Add or replace the instance under `id`, returning the previous one.
    pub fn insert(&mut self, id: ChannelId, rpc: RpcInstance) -> Option<RpcInstance> {
        self.channels.insert(id, rpc)
    }

    pub fn remove(&mut self, id: ChannelId) -> Option<RpcInstance> {
        let removed = self.channels.remove(&id);
        if removed.is_some() {
            debug!(%id, "channel removed");
        }
        removed
    }

    pub fn get(&self, id: ChannelId) -> Option<&RpcInstance> {
        self.channels.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Emit `name` on every channel, in id order.
    pub fn broadcast(&self, name: &str, payload: &Value) -> BroadcastReport {
        self.broadcast_where(|_| true, name, payload)
    }

    /// Emit `name` on every channel whose id satisfies `filter`.
    ///
    /// A failing channel does not stop delivery to the rest.
    pub fn broadcast_where<F>(&self, filter: F, name: &str, payload: &Value) -> BroadcastReport
    where
        F: Fn(ChannelId) -> bool,
    {
        let mut report = BroadcastReport::default();
        for (id, rpc) in self.channels.iter().filter(|(id, _)| filter(**id)) {
            match rpc.emit(name, payload.clone()) {
                Ok(()) => report.delivered.push(*id),
                Err(e) => {
                    warn!(%id, message = name, error = %e, "broadcast to channel failed");
                    report.failed.push((*id, e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcOptions;
    use crate::transport::{LoopbackTransport, StubTransport};
    use serde_json::json;

    fn connected() -> (RpcInstance, RpcInstance) {
        let (near, far) = LoopbackTransport::pair();
        (
            RpcInstance::new(RpcOptions::new().transport(near)),
            RpcInstance::new(RpcOptions::new().transport(far)),
        )
    }

    #[test]
    fn test_register_assigns_distinct_ids() {
        let mut registry = ChannelRegistry::new();
        let a = registry.register(RpcInstance::new(RpcOptions::new()));
        let b = registry.register(RpcInstance::new(RpcOptions::new()));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(a).is_some());
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
    }

    #[test]
    fn test_broadcast_reports_each_channel() {
        let mut registry = ChannelRegistry::new();
        let (near, far) = connected();
        let received = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = received.clone();
        far.subscribe("reload", move |payload: &Value| sink.lock().push(payload.clone()))
            .unwrap();

        let good = registry.register(near);
        let bad = registry.register(RpcInstance::new(RpcOptions::new().transport(StubTransport)));

        let report = registry.broadcast("reload", &json!({"hard": true}));

        assert_eq!(report.delivered, vec![good]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, bad);
        assert!(!report.is_complete());
        assert_eq!(*received.lock(), vec![json!({"hard": true})]);
    }

    #[test]
    fn test_broadcast_where_filters() {
        let mut registry = ChannelRegistry::new();
        let (a, _a_far) = connected();
        let (b, _b_far) = connected();
        registry.insert(ChannelId(1), a);
        registry.insert(ChannelId(2), b);

        let report = registry.broadcast_where(|id| id == ChannelId(2), "ping", &Value::Null);
        assert_eq!(report.delivered, vec![ChannelId(2)]);
        assert!(report.is_complete());
    }
}
