// In-memory stand-ins for the browser's messaging primitives

use crate::BusError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::debug;
use wire_types::BusMessage;

const CHANNEL_CAPACITY: usize = 256;

/// Identifier of a browser tab, required for tab-targeted delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u32);

/// A message as observed on the same-document window channel
///
/// Window messaging is shared with the page and with other frames, so
/// every delivery is tagged with whether it originated from the document's
/// own window. Listeners must reject anything else.
#[derive(Debug, Clone)]
pub struct WindowEvent {
    /// The delivered message
    pub message: BusMessage,
    /// Whether the source was this document's own window
    pub same_window: bool,
}

/// Same-document window messaging
///
/// Both directions between the injected script and the content script use
/// this channel; addressing is purely listener-side filtering.
pub struct WindowChannel {
    tx: broadcast::Sender<WindowEvent>,
    /// When set, every post fails; used to simulate a torn-down document
    /// or invalidated extension context
    invalidated: AtomicBool,
}

impl WindowChannel {
    /// Create a window channel
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            invalidated: AtomicBool::new(false),
        }
    }

    /// Post a message from this document's own window
    pub fn post(&self, message: BusMessage) -> Result<(), BusError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(BusError::ContextInvalidated);
        }
        debug!(to = %message.to, from = %message.from, "window post");
        // No receivers is fine; window messaging is broadcast-and-forget.
        let _ = self.tx.send(WindowEvent {
            message,
            same_window: true,
        });
        Ok(())
    }

    /// Make every subsequent post fail
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    /// Post a message as if it came from another frame
    ///
    /// Exists so listener-side source filtering can be exercised.
    pub fn post_foreign(&self, message: BusMessage) {
        let _ = self.tx.send(WindowEvent {
            message,
            same_window: false,
        });
    }

    /// Subscribe to every message on the channel
    pub fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.tx.subscribe()
    }
}

impl Default for WindowChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension runtime messaging: broadcast plus tab-targeted delivery
///
/// Runtime sends reach every subscriber; tab-targeted sends reach only
/// subscribers registered against that tab. Sending to a tab nobody is
/// registered for is a delivery failure, the moral equivalent of
/// "receiving end does not exist".
pub struct ExtensionHub {
    runtime_tx: broadcast::Sender<BusMessage>,
    tabs: DashMap<TabId, broadcast::Sender<BusMessage>>,
    /// When set, every send fails; used to simulate an invalidated
    /// extension context.
    invalidated: AtomicBool,
}

impl ExtensionHub {
    /// Create a hub
    pub fn new() -> Self {
        let (runtime_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            runtime_tx,
            tabs: DashMap::new(),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Broadcast on the runtime channel
    pub fn broadcast(&self, message: BusMessage) -> Result<(), BusError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(BusError::ContextInvalidated);
        }
        debug!(to = %message.to, from = %message.from, "runtime broadcast");
        let _ = self.runtime_tx.send(message);
        Ok(())
    }

    /// Deliver to subscribers registered against a tab
    pub fn send_to_tab(&self, tab_id: TabId, message: BusMessage) -> Result<(), BusError> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(BusError::ContextInvalidated);
        }
        let tab = self
            .tabs
            .get(&tab_id)
            .ok_or(BusError::NoReceivingEnd(tab_id.0))?;
        debug!(to = %message.to, from = %message.from, tab = tab_id.0, "tab send");
        let _ = tab.send(message);
        Ok(())
    }

    /// Subscribe to runtime broadcasts
    pub fn subscribe_runtime(&self) -> broadcast::Receiver<BusMessage> {
        self.runtime_tx.subscribe()
    }

    /// Subscribe to messages targeted at a tab
    pub fn subscribe_tab(&self, tab_id: TabId) -> broadcast::Receiver<BusMessage> {
        let entry = self
            .tabs
            .entry(tab_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        entry.subscribe()
    }

    /// Make every subsequent send fail, as after an extension reload
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }
}

impl Default for ExtensionHub {
    fn default() -> Self {
        Self::new()
    }
}
