// Page-side correlation wrapper over the message bus

use message_bus::{ListenerHandle, Messenger, MessageIdFactory, ReplyBroker};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use wire_types::{BusMessage, Entity, MessageKind};

/// The injected script's sending surface
///
/// Wraps send/listen with reply correlation: an acknowledged message gets
/// the next id from a per-process counter, its resolver is registered
/// before the send, and the returned future resolves on the first reply
/// bearing that id. There is no timeout; an unanswered id stays pending.
/// A send that fails outright resolves immediately with `{}` so the hook
/// chain falls through to the network instead of hanging.
pub struct PageBus {
    messenger: Arc<Messenger>,
    broker: Arc<ReplyBroker>,
    ids: MessageIdFactory,
    _listener: ListenerHandle,
}

impl PageBus {
    /// Wire the bus up to its window transport
    pub fn new(messenger: Arc<Messenger>) -> Self {
        let broker = Arc::new(ReplyBroker::new());
        let dispatch = broker.clone();
        let listener = messenger.listen(Entity::Hook, None, move |message| {
            dispatch.dispatch(message.id, message.message);
        });
        Self {
            messenger,
            broker,
            ids: MessageIdFactory::new(),
            _listener: listener,
        }
    }

    /// Install the handler for payloads the content side pushes
    /// unsolicited
    pub fn set_default_listener(&self, listener: impl Fn(Value) + Send + Sync + 'static) {
        self.broker.set_default_listener(listener);
    }

    /// Fire-and-forget a log entry to the content script
    pub fn send_log(&self, payload: Value) {
        let _ = self.messenger.send(
            BusMessage::fire_and_forget(payload, Entity::Hook, Entity::Content, MessageKind::Log),
            None,
        );
    }

    /// Send a message, optionally awaiting its correlated reply
    ///
    /// Returns `None` for fire-and-forget sends. With `ack_required`, the
    /// reply payload is returned; a failed send yields `{}` right away.
    pub async fn post_message(
        &self,
        payload: Value,
        kind: MessageKind,
        ack_required: bool,
    ) -> Option<Value> {
        if !ack_required {
            let _ = self.messenger.send(
                BusMessage::fire_and_forget(payload, Entity::Hook, Entity::Content, kind),
                None,
            );
            return None;
        }

        let id = self.ids.next_id();
        // Register before sending so a fast reply cannot race the waiter.
        let rx = self.broker.register(id);
        let message = BusMessage::with_id(id, payload, Entity::Hook, Entity::Content, kind);
        if self.messenger.send(message, None).is_err() {
            self.broker.unregister(id);
            debug!(id, "send failed, resolving empty");
            return Some(json!({}));
        }
        Some(rx.await.unwrap_or_else(|_| json!({})))
    }

    /// Number of sent-but-unanswered messages
    pub fn pending_count(&self) -> usize {
        self.broker.pending_count()
    }
}
