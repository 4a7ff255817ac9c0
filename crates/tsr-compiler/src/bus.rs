//! Lifecycle event bus
//!
//! Publish/subscribe keyed by [`EventKind`]. Delivery is synchronous: every
//! handler registered for a kind runs, in registration order, before
//! `publish` returns. Nothing is buffered, so a handler only sees events
//! published after it subscribed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// The lifecycle events of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Transform,
    Diagnostics,
    Cleanup,
    Stop,
    End,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Start,
        EventKind::Transform,
        EventKind::Diagnostics,
        EventKind::Cleanup,
        EventKind::Stop,
        EventKind::End,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Transform => "transform",
            EventKind::Diagnostics => "diagnostics",
            EventKind::Cleanup => "cleanup",
            EventKind::Stop => "stop",
            EventKind::End => "end",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event instance, fully described by its kind and payload
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Value,
}

/// Type alias for event handler functions
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// The bus. One instance per run, shared by reference with every component
/// that publishes or subscribes.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Deliver an event to every handler currently registered for its kind
    pub fn publish(&self, kind: EventKind, payload: Value) {
        // Snapshot the list so handlers may subscribe without deadlocking
        let handlers: Vec<Handler> = {
            let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            map.get(&kind).cloned().unwrap_or_default()
        };
        trace!(event = %kind, handlers = handlers.len(), "publishing");

        let event = Event { kind, payload };
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> = map.iter().map(|(kind, list)| (*kind, list.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}
