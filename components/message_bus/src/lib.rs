//! Cross-context message routing and reply correlation
//!
//! Moves a [`BusMessage`] between the three participants (injected hook
//! script, content script, devtools panel), choosing the browser transport
//! from a fixed topology:
//!
//! | from → to | transport |
//! |---|---|
//! | HOOK → CONTENT | same-document window messaging |
//! | CONTENT → HOOK | same-document window messaging |
//! | CONTENT → PANEL | tab-targeted extension messaging |
//! | PANEL → CONTENT | runtime broadcast messaging |
//!
//! Any other pair is a configuration error. Delivery is best-effort: a
//! failed send is logged and dropped, never retried, and callers fall
//! back to the real network.

pub mod broker;
pub mod transport;

pub use broker::{MessageIdFactory, ReplyBroker};
pub use transport::{ExtensionHub, TabId, WindowChannel, WindowEvent};

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wire_types::{BusMessage, Entity};

/// Errors raised by routing and delivery
#[derive(Error, Debug)]
pub enum BusError {
    /// The (from, to) pair is not in the routing table
    #[error("No transport routes {from} -> {to}")]
    Unroutable { from: Entity, to: Entity },

    /// Tab-targeted transport was selected but no tab id was supplied
    #[error("Tab transport requires a tab id")]
    MissingTabId,

    /// No subscriber is registered for the targeted tab
    #[error("Receiving end does not exist for tab {0}")]
    NoReceivingEnd(u32),

    /// The extension context has been invalidated (e.g. reload)
    #[error("Extension context invalidated")]
    ContextInvalidated,
}

/// The transport selected for a participant pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Same-document window messaging
    Window,
    /// Extension runtime broadcast
    Runtime,
    /// Tab-targeted extension messaging
    Tab,
}

/// Look up the transport for a participant pair
///
/// The table is exhaustive; unlisted pairs are configuration errors, not
/// silent drops.
pub fn route(from: Entity, to: Entity) -> Result<Channel, BusError> {
    match (from, to) {
        (Entity::Hook, Entity::Content) => Ok(Channel::Window),
        (Entity::Content, Entity::Hook) => Ok(Channel::Window),
        (Entity::Content, Entity::Panel) => Ok(Channel::Tab),
        (Entity::Panel, Entity::Content) => Ok(Channel::Runtime),
        (from, to) => Err(BusError::Unroutable { from, to }),
    }
}

/// Handle over the listener tasks spawned by [`Messenger::listen`]
///
/// Tasks are aborted when the handle is shut down or dropped.
pub struct ListenerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stop every listener task
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sends and receives bus messages over the underlying transports
///
/// One messenger per execution context; all contexts in a test share the
/// same channel objects, exactly as all the real contexts share one
/// window and one extension runtime.
pub struct Messenger {
    window: Arc<WindowChannel>,
    hub: Arc<ExtensionHub>,
}

impl Messenger {
    /// Create a messenger over the given transports
    pub fn new(window: Arc<WindowChannel>, hub: Arc<ExtensionHub>) -> Self {
        Self { window, hub }
    }

    /// Send a message via the transport the topology selects
    ///
    /// Failures are logged and reported, but the policy at every call site
    /// is to drop the message and carry on: a lost message degrades to
    /// pass-through behavior, never to a hang or a crash.
    pub fn send(&self, message: BusMessage, tab_id: Option<TabId>) -> Result<(), BusError> {
        let result = match route(message.from, message.to) {
            Ok(Channel::Window) => self.window.post(message),
            Ok(Channel::Runtime) => self.hub.broadcast(message),
            Ok(Channel::Tab) => match tab_id {
                Some(tab_id) => self.hub.send_to_tab(tab_id, message),
                None => Err(BusError::MissingTabId),
            },
            Err(err) => Err(err),
        };

        if let Err(ref err) = result {
            warn!("MOKKU: Error in message service: {}", err);
        }
        result
    }

    /// Subscribe a participant to every transport relevant to it
    ///
    /// HOOK listens on window events only; CONTENT on window events and
    /// runtime messages (it is the hub between page and extension); PANEL
    /// on runtime messages, including those targeted at its tab. Inbound
    /// messages are filtered by addressee, extension tag and, for window
    /// events, by same-window source.
    pub fn listen(
        &self,
        entity: Entity,
        tab_id: Option<TabId>,
        callback: impl Fn(BusMessage) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let callback: Arc<dyn Fn(BusMessage) + Send + Sync> = Arc::new(callback);
        let mut tasks = Vec::new();

        let on_window = matches!(entity, Entity::Hook | Entity::Content);
        let on_runtime = matches!(entity, Entity::Content | Entity::Panel);

        if on_window {
            let mut rx = self.window.subscribe();
            let callback = callback.clone();
            tasks.push(tokio::spawn(async move {
                while let Ok(event) = rx.recv().await {
                    // We only accept messages from our own window.
                    if !event.same_window {
                        continue;
                    }
                    if event.message.is_ours() && event.message.is_for(entity) {
                        callback(event.message);
                    }
                }
            }));
        }

        if on_runtime {
            let mut rx = self.hub.subscribe_runtime();
            let runtime_callback = callback.clone();
            tasks.push(tokio::spawn(async move {
                while let Ok(message) = rx.recv().await {
                    if message.is_ours() && message.is_for(entity) {
                        runtime_callback(message);
                    }
                }
            }));

            if entity == Entity::Panel {
                if let Some(tab_id) = tab_id {
                    let mut rx = self.hub.subscribe_tab(tab_id);
                    let callback = callback.clone();
                    tasks.push(tokio::spawn(async move {
                        while let Ok(message) = rx.recv().await {
                            if message.is_ours() && message.is_for(entity) {
                                callback(message);
                            }
                        }
                    }));
                }
            }
        }

        debug!(%entity, listeners = tasks.len(), "listener installed");
        ListenerHandle { tasks }
    }
}
