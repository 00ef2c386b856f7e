// Event surface of the facade objects

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Events a facade can fire at page code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacadeEventKind {
    /// `readystatechange`
    ReadyStateChange,
    /// `loadstart`
    LoadStart,
    /// `progress`
    Progress,
    /// `load`
    Load,
    /// `loadend`
    LoadEnd,
    /// `error`
    Error,
    /// `abort`
    Abort,
    /// `timeout`
    Timeout,
}

/// A dispatched event instance
#[derive(Debug, Clone)]
pub struct FacadeEvent {
    /// Which event fired
    pub kind: FacadeEventKind,
}

/// Callback attached to the event surface
pub type EventListener = Arc<dyn Fn(&FacadeEvent) + Send + Sync>;

/// Token returned by `add_event_listener`, used to remove that listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken(u64);

/// Tiny event emitter backing the facades
///
/// Mirrors the native surface: `addEventListener`-style ordered listeners
/// plus one legacy `on<event>` slot per kind, which fires before the
/// listener list.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<Vec<(ListenerToken, FacadeEventKind, EventListener)>>,
    legacy: RwLock<HashMap<FacadeEventKind, EventListener>>,
    next_token: AtomicU64,
}

impl EventEmitter {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener for an event kind
    pub fn add_event_listener(
        &self,
        kind: FacadeEventKind,
        listener: impl Fn(&FacadeEvent) + Send + Sync + 'static,
    ) -> ListenerToken {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((token, kind, Arc::new(listener)));
        token
    }

    /// Detach a previously attached listener
    pub fn remove_event_listener(&self, token: ListenerToken) {
        self.listeners.write().retain(|(t, _, _)| *t != token);
    }

    /// Set or clear the legacy `on<event>` handler for a kind
    pub fn set_handler(
        &self,
        kind: FacadeEventKind,
        handler: Option<EventListener>,
    ) {
        let mut legacy = self.legacy.write();
        match handler {
            Some(handler) => {
                legacy.insert(kind, handler);
            }
            None => {
                legacy.remove(&kind);
            }
        }
    }

    /// Fire an event: the legacy handler first, then listeners in
    /// attachment order
    pub fn dispatch(&self, kind: FacadeEventKind) {
        let event = FacadeEvent { kind };

        let legacy = self.legacy.read().get(&kind).cloned();
        if let Some(handler) = legacy {
            handler(&event);
        }

        let listeners: Vec<EventListener> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}
