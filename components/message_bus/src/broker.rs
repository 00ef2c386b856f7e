// Correlation-id allocation and reply dispatch

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::debug;

/// Strictly-increasing per-process correlation-id source
///
/// Ids start at 1 and are never reused within a process lifetime.
#[derive(Debug)]
pub struct MessageIdFactory {
    next: AtomicU64,
}

impl MessageIdFactory {
    /// Create a factory whose first id is 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MessageIdFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-process correlation table mapping pending ids to reply resolvers
///
/// A resolver is registered synchronously before its message is sent, so a
/// reply can never race the wiring-up of the waiter. Entries are removed
/// on the first matching reply; there is no timeout, so an unanswered id
/// stays in the table forever.
pub struct ReplyBroker {
    pending: DashMap<u64, oneshot::Sender<Value>>,
    default_listener: RwLock<Option<Box<dyn Fn(Value) + Send + Sync>>>,
}

impl ReplyBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            default_listener: RwLock::new(None),
        }
    }

    /// Register a single-use resolver for an id
    ///
    /// Must be called before the correlated message is sent.
    pub fn register(&self, id: u64) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        rx
    }

    /// Drop a pending resolver, e.g. when the send itself failed
    pub fn unregister(&self, id: u64) {
        self.pending.remove(&id);
    }

    /// Dispatch an inbound payload to its waiter
    ///
    /// A payload without an id, or with an id nobody registered, goes to
    /// the default listener; without one it is silently dropped.
    pub fn dispatch(&self, id: Option<u64>, payload: Value) {
        if let Some(id) = id {
            if let Some((_, tx)) = self.pending.remove(&id) {
                // A dropped receiver just means the waiter went away.
                let _ = tx.send(payload);
                return;
            }
        }
        match self.default_listener.read().as_ref() {
            Some(listener) => listener(payload),
            None => debug!(?id, "no resolver for dispatch, dropping"),
        }
    }

    /// Install the fallback for unsolicited payloads
    pub fn set_default_listener(&self, listener: impl Fn(Value) + Send + Sync + 'static) {
        *self.default_listener.write() = Some(Box::new(listener));
    }

    /// Number of un-answered correlation entries
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ReplyBroker {
    fn default() -> Self {
        Self::new()
    }
}
