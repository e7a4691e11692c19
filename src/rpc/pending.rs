//! Outstanding request bookkeeping
//!
//! Each outbound request owns one entry from issue until exactly one of
//! these settles it: a matching response, or its timer. Both paths remove
//! the entry under the same lock, so whichever runs second finds nothing
//! and does nothing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use bridge_protocol::ResponsePacket;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::RpcError;

type Settlement = Result<Value, RpcError>;

/// Hands out request ids: 1, 2, ..., max, then 0, 1, 2, ...
#[derive(Debug, Clone)]
pub(crate) struct IdAllocator {
    last: u64,
    max: u64,
}

impl IdAllocator {
    pub(crate) fn new(max: u64) -> Self {
        Self { last: 0, max }
    }

    pub(crate) fn next(&mut self) -> u64 {
        self.last = if self.last >= self.max { 0 } else { self.last + 1 };
        self.last
    }
}

struct PendingEntry {
    method: String,
    /// Distinguishes this entry from a later one that reused its id.
    seq: u64,
    resolver: oneshot::Sender<Settlement>,
    timer: Option<JoinHandle<()>>,
}

pub(crate) struct RequestState {
    ids: IdAllocator,
    next_seq: u64,
    pending: HashMap<u64, PendingEntry>,
}

pub(crate) type SharedRequests = Arc<Mutex<RequestState>>;

impl RequestState {
    pub(crate) fn new(max_request_id: u64) -> Self {
        Self {
            ids: IdAllocator::new(max_request_id),
            next_seq: 0,
            pending: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Allocate an id, record the entry and arm its timer.
///
/// `timer` is `None` when the limit is infinite. A limit too large to
/// express as a deadline behaves as infinite.
pub(crate) fn register(
    requests: &SharedRequests,
    method: &str,
    timer: Option<(Handle, Duration)>,
) -> ResponseFuture {
    let (resolver, rx) = oneshot::channel();
    let mut state = requests.lock();

    let id = state.ids.next();
    state.next_seq += 1;
    let seq = state.next_seq;

    let timer = timer.and_then(|(runtime, after)| {
        let Some(deadline) = Instant::now().checked_add(after) else {
            debug!(id, method, ?after, "request time limit out of range; no timer armed");
            return None;
        };
        Some(runtime.spawn(expire(Arc::downgrade(requests), id, seq, deadline, after)))
    });

    let entry = PendingEntry {
        method: method.to_string(),
        seq,
        resolver,
        timer,
    };

    if let Some(displaced) = state.pending.insert(id, entry) {
        // Only reachable after the id space wrapped under a long-pending call.
        warn!(id, method = %displaced.method, "request id reused while still pending");
        if let Some(timer) = displaced.timer {
            timer.abort();
        }
    }

    ResponseFuture { id, seq, rx }
}

/// Remove an entry whose request never left, e.g. because `send` failed.
pub(crate) fn discard(requests: &SharedRequests, future: &ResponseFuture) {
    let mut state = requests.lock();
    if state.pending.get(&future.id).is_some_and(|e| e.seq == future.seq) {
        if let Some(entry) = state.pending.remove(&future.id) {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }
}

/// Settle the entry matching `response.id`. Returns false when none exists.
pub(crate) fn settle(requests: &SharedRequests, response: ResponsePacket) -> bool {
    let entry = requests.lock().pending.remove(&response.id);
    let Some(entry) = entry else {
        return false;
    };

    if let Some(timer) = entry.timer {
        timer.abort();
    }

    let id = response.id;
    let result = response.into_result().map_err(RpcError::Remote);
    if entry.resolver.send(result).is_err() {
        debug!(id, method = %entry.method, "caller stopped waiting before the response arrived");
    }
    true
}

async fn expire(
    requests: Weak<Mutex<RequestState>>,
    id: u64,
    seq: u64,
    deadline: Instant,
    after: Duration,
) {
    tokio::time::sleep_until(deadline).await;

    let Some(requests) = requests.upgrade() else {
        return;
    };

    let entry = {
        let mut state = requests.lock();
        match state.pending.get(&id) {
            Some(entry) if entry.seq == seq => state.pending.remove(&id),
            _ => None,
        }
    };

    if let Some(entry) = entry {
        debug!(id, method = %entry.method, ?after, "request timed out");
        let _ = entry.resolver.send(Err(RpcError::Timeout {
            id,
            method: entry.method,
            after,
        }));
    }
}

/// Resolves with the response payload, the remote error, or a timeout.
#[derive(Debug)]
#[must_use = "a request does nothing useful unless its response is awaited"]
pub struct ResponseFuture {
    id: u64,
    seq: u64,
    rx: oneshot::Receiver<Settlement>,
}

impl ResponseFuture {
    /// Wire id of the request.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for ResponseFuture {
    type Output = Result<Value, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RpcError::Abandoned { id })),
            Poll::Pending => Poll::Pending,
        }
    }
}
