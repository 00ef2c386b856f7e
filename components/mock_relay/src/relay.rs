// Content-script relay: answers mock queries and forwards logs

use crate::store::{MockStore, MockStoreProvider, StorageError};
use message_bus::{ListenerHandle, Messenger, TabId};
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use wire_types::{BusMessage, Entity, MessageKind, MockQueryReply, NetworkLog};

/// Payload of the store-change notification sent by the panel
pub const UPDATE_STORE: &str = "UPDATE_STORE";

struct Inner {
    messenger: Arc<Messenger>,
    provider: Arc<dyn MockStoreProvider>,
    tab_id: TabId,
    store: RwLock<Arc<MockStore>>,
}

/// The content-script side of the interception pipeline
///
/// Sits between the injected hook script and the extension: answers the
/// hook's mock queries from the current store snapshot, forwards logs to
/// the panel, and reloads the snapshot when the panel announces a store
/// change. It never blocks a request: a query it cannot answer degrades
/// to "no mock".
#[derive(Clone)]
pub struct ContentScript {
    inner: Arc<Inner>,
}

impl ContentScript {
    /// Load the store, announce the host to the panel, and start listening
    ///
    /// The returned handle owns the listener tasks; dropping it stops the
    /// relay.
    pub async fn boot(
        messenger: Arc<Messenger>,
        provider: Arc<dyn MockStoreProvider>,
        tab_id: TabId,
        host: &str,
    ) -> Result<(Self, ListenerHandle), StorageError> {
        let store = provider.fetch().await?;
        let script = Self {
            inner: Arc::new(Inner {
                messenger: messenger.clone(),
                provider,
                tab_id,
                store: RwLock::new(Arc::new(store)),
            }),
        };

        let for_listener = script.clone();
        let handle = messenger.listen(Entity::Content, Some(tab_id), move |message| {
            for_listener.handle_message(message);
        });

        // Best effort, like every send: a panel that is not open yet will
        // simply miss the announcement.
        let _ = messenger.send(
            BusMessage::fire_and_forget(json!(host), Entity::Content, Entity::Panel, MessageKind::Init),
            Some(tab_id),
        );

        Ok((script, handle))
    }

    /// Current store snapshot
    pub fn store(&self) -> Arc<MockStore> {
        self.inner.store.read().clone()
    }

    /// Replace the snapshot with a freshly fetched one
    pub async fn refresh_store(&self) -> Result<(), StorageError> {
        let store = self.inner.provider.fetch().await?;
        let count = store.mocks().len();
        *self.inner.store.write() = Arc::new(store);
        debug!(mocks = count, "mock store reloaded");
        Ok(())
    }

    fn handle_message(&self, message: BusMessage) {
        match message.kind {
            MessageKind::Log => self.forward_log(message),
            MessageKind::Notification => {
                if message.message == json!(UPDATE_STORE) {
                    let script = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = script.refresh_store().await {
                            warn!("MOKKU: failed to reload mock store: {}", err);
                        }
                    });
                } else if message.id.is_some() {
                    self.answer_mock_query(message);
                } else {
                    debug!("unacknowledged notification dropped");
                }
            }
            // Neither kind is ever addressed to the content script.
            MessageKind::Init | MessageKind::Hook => {}
        }
    }

    /// Relay a log entry from the hook script to the panel
    ///
    /// When an active mock covers the logged request, the entry is
    /// annotated with `isMocked` and the mock's getter path before it
    /// goes out. A payload that is not a log passes through untouched.
    fn forward_log(&self, message: BusMessage) {
        let mut payload = message.message;
        if let Ok(mut log) = serde_json::from_value::<NetworkLog>(payload.clone()) {
            let store = self.store();
            if let Some((path, _)) =
                store.active_mock_with_path(&log.request.url, &log.request.method)
            {
                log.is_mocked = Some(true);
                log.mock_path = Some(path.to_string());
                if let Ok(annotated) = serde_json::to_value(&log) {
                    payload = annotated;
                }
            }
        }
        let forwarded =
            BusMessage::fire_and_forget(payload, Entity::Content, Entity::Panel, MessageKind::Log);
        let _ = self.inner.messenger.send(forwarded, Some(self.inner.tab_id));
    }

    /// Answer a mock query with `{}` or `{ mockResponse }`
    ///
    /// A malformed query is dropped; the hook side falls through to the
    /// network when no reply arrives.
    fn answer_mock_query(&self, message: BusMessage) {
        let Some(id) = message.id else { return };
        let log: NetworkLog = match serde_json::from_value(message.message) {
            Ok(log) => log,
            Err(err) => {
                warn!("MOKKU: malformed mock query: {}", err);
                return;
            }
        };

        let store = self.store();
        let reply = match store.active_mock_with_path(&log.request.url, &log.request.method) {
            Some((path, mock)) => {
                debug!(url = %log.request.url, path = %path, "mock applies");
                MockQueryReply {
                    mock_response: Some(mock.clone()),
                }
            }
            None => MockQueryReply::default(),
        };

        let payload = serde_json::to_value(&reply).unwrap_or_else(|_| json!({}));
        let _ = self.inner.messenger.send(
            BusMessage::with_id(id, payload, Entity::Content, Entity::Hook, MessageKind::Hook),
            None,
        );
    }
}
