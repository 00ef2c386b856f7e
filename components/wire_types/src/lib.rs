// Message-bus wire types, log payloads, and mock definitions
//
// This module is part of the Mokku interception core.

pub mod log;
pub mod mock;

// Re-export commonly used types
pub use log::{HeaderEntry, MockQueryReply, NetworkLog, RequestLog, ResponseLog};
pub use mock::MockDefinition;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension identity tag stamped on every bus message
///
/// Shared channels (window messaging in particular) carry unrelated page
/// and extension traffic; receivers drop anything without this tag.
pub const EXTENSION_NAME: &str = "MOKKU";

/// Storage key the mock store is persisted under
pub const STORE_KEY: &str = "mokku.extension.main.db";

/// Storage key for the per-host activation flag
pub fn host_active_key(host: &str) -> String {
    format!("mokku.extension.active.{}", host)
}

/// One of the three addressable message-bus participants
///
/// The extension runtime itself is a transport, not an addressable
/// participant, so it does not appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Entity {
    /// Script injected into the page (the facades live here)
    Hook,
    /// Content script, the bridge between page and extension
    Content,
    /// Devtools panel UI
    Panel,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Hook => write!(f, "HOOK"),
            Entity::Content => write!(f, "CONTENT"),
            Entity::Panel => write!(f, "PANEL"),
        }
    }
}

/// Closed set of message kinds carried on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Request/response log entry, fire-and-forget
    Log,
    /// Store-change notification or an acknowledged mock query
    Notification,
    /// Content script announcing itself (payload is the host)
    Init,
    /// Correlated reply addressed back to the injected script
    Hook,
}

/// The unit exchanged on the message bus
///
/// `id` is present only when the sender expects a correlated reply;
/// fire-and-forget messages carry `id: null` and never receive one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusMessage {
    /// Correlation id, `None` for fire-and-forget
    pub id: Option<u64>,
    /// Arbitrary payload
    pub message: serde_json::Value,
    /// Receiving participant
    pub to: Entity,
    /// Sending participant
    pub from: Entity,
    /// Extension identity tag (see [`EXTENSION_NAME`])
    #[serde(rename = "extensionName")]
    pub extension_name: String,
    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl BusMessage {
    /// Create a fire-and-forget message (no correlation id)
    pub fn fire_and_forget(
        message: serde_json::Value,
        from: Entity,
        to: Entity,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: None,
            message,
            to,
            from,
            extension_name: EXTENSION_NAME.to_string(),
            kind,
        }
    }

    /// Create a message that expects a correlated reply
    pub fn with_id(
        id: u64,
        message: serde_json::Value,
        from: Entity,
        to: Entity,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: Some(id),
            message,
            to,
            from,
            extension_name: EXTENSION_NAME.to_string(),
            kind,
        }
    }

    /// Whether this message carries our extension tag
    ///
    /// Anything else on a shared channel is foreign traffic and must be
    /// ignored by receivers.
    pub fn is_ours(&self) -> bool {
        self.extension_name == EXTENSION_NAME
    }

    /// Whether this message is addressed to the given participant
    pub fn is_for(&self, entity: Entity) -> bool {
        self.to == entity
    }
}
