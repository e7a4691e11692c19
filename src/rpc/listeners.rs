//! Message listener table and dispatch.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::hooks::{DebugHooks, Diagnostic};

pub type MessageListener = Arc<dyn Fn(&Value) + Send + Sync>;
pub type WildcardListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct ListenerTable {
    next_id: u64,
    named: HashMap<String, Vec<(ListenerId, MessageListener)>>,
    wildcard: Vec<(ListenerId, WildcardListener)>,
}

impl ListenerTable {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub(crate) fn add_named(&mut self, name: &str, listener: MessageListener) -> ListenerId {
        let id = self.allocate();
        self.named
            .entry(name.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn add_wildcard(&mut self, listener: WildcardListener) -> ListenerId {
        let id = self.allocate();
        self.wildcard.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        if let Some(pos) = self.wildcard.iter().position(|(l, _)| *l == id) {
            self.wildcard.remove(pos);
            return true;
        }

        let mut emptied = None;
        let mut found = false;
        for (name, listeners) in self.named.iter_mut() {
            if let Some(pos) = listeners.iter().position(|(l, _)| *l == id) {
                listeners.remove(pos);
                found = true;
                if listeners.is_empty() {
                    emptied = Some(name.clone());
                }
                break;
            }
        }
        if let Some(name) = emptied {
            self.named.remove(&name);
        }
        found
    }

    pub(crate) fn len(&self) -> usize {
        self.wildcard.len() + self.named.values().map(Vec::len).sum::<usize>()
    }

    fn snapshot(&self, name: &str) -> (Vec<WildcardListener>, Vec<MessageListener>) {
        let wildcard = self.wildcard.iter().map(|(_, l)| l.clone()).collect();
        let named = self
            .named
            .get(name)
            .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        (wildcard, named)
    }
}

/// Run every wildcard listener, then every listener for `name`.
///
/// Listeners run outside the table lock, so they may subscribe or
/// unsubscribe; changes apply from the next message on. Returns the number
/// of listeners invoked.
pub(crate) fn dispatch(
    table: &parking_lot::Mutex<ListenerTable>,
    hooks: &DebugHooks,
    name: &str,
    payload: &Value,
) -> usize {
    let (wildcard, named) = table.lock().snapshot(name);
    let invoked = wildcard.len() + named.len();

    for listener in wildcard {
        isolate(hooks, name, || listener(name, payload));
    }
    for listener in named {
        isolate(hooks, name, || listener(payload));
    }

    invoked
}

fn isolate(hooks: &DebugHooks, name: &str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!(message = name, "message listener panicked");
        hooks.diagnose(Diagnostic::ListenerPanicked {
            name: name.to_string(),
        });
    }
}
