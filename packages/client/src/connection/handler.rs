//! Registry of inbound event handlers.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

/// Handler for one hub event; receives the invocation arguments
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Handle returned by [`HubConnection::on`](super::HubConnection::on)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    target: String,
    id: u64,
}

impl Subscription {
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Handlers keyed by lower-cased target, kept in registration order
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, EventHandler)>>,
}

impl HandlerRegistry {
    pub fn register(&mut self, target: &str, handler: EventHandler) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(target.to_lowercase())
            .or_default()
            .push((id, handler));
        Subscription {
            target: target.to_string(),
            id,
        }
    }

    /// Returns `false` if the subscription was already gone
    pub fn unregister(&mut self, subscription: &Subscription) -> bool {
        let key = subscription.target.to_lowercase();
        let Some(handlers) = self.handlers.get_mut(&key) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.handlers.remove(&key);
        }
        removed
    }

    /// Snapshot of the handlers for `target`, so they can run without the registry locked
    pub fn handlers_for(&self, target: &str) -> Vec<EventHandler> {
        self.handlers
            .get(&target.to_lowercase())
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("targets", &self.handlers.keys().collect::<Vec<_>>())
            .field("handlers", &self.len())
            .finish()
    }
}
