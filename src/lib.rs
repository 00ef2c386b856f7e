//! Mokku: HTTP request interception with developer-defined mocks
//!
//! Ties the pieces together the way the extension does at load time: the
//! network facades in the page, the hook pipeline they share, the message
//! bus spanning page/content/panel, and the content-script relay that
//! answers mock queries out of the persisted store.
//!
//! Each piece is usable on its own; [`Interceptor`] is the one-call setup
//! for embedding or testing the whole pipeline in a single process.

pub use hook_pipeline::{
    AfterHook, BeforeHook, BeforeVerdict, Body, ChainOutcome, HookRegistry, RequestDescriptor,
    ResponseDescriptor, ResponsePatch,
};
pub use message_bus::{BusError, Channel, ExtensionHub, Messenger, TabId, WindowChannel};
pub use mock_relay::{
    ContentScript, ExtensionStorage, InMemoryStorage, MockStore, StorageStoreProvider,
    UPDATE_STORE,
};
pub use network_facade::{
    BackendResponse, FetchClient, FetchRequest, FetchResponse, InMemoryBackend, NetworkBackend,
    XhrFacade,
};
pub use page_agent::{PageAgent, PageBus};
pub use wire_types::{BusMessage, Entity, MessageKind, MockDefinition, NetworkLog};

use anyhow::Result;
use mock_relay::MockStoreProvider;
use std::sync::Arc;

/// A fully wired interception pipeline in one process
///
/// Stands in for what the extension assembles across its real contexts:
/// one shared window channel and extension hub, the page agent with its
/// hooks, and a booted content script over the given storage. Facades
/// created from it behave exactly as they would in the page.
pub struct Interceptor {
    hooks: Arc<HookRegistry>,
    backend: Arc<dyn NetworkBackend>,
    window: Arc<WindowChannel>,
    hub: Arc<ExtensionHub>,
    tab_id: TabId,
    content: ContentScript,
    _agent: Option<PageAgent>,
    _content_listener: message_bus::ListenerHandle,
}

impl Interceptor {
    /// Boot the whole pipeline for one host
    ///
    /// The content script always comes up (it owns the host announcement
    /// and the store), but the page agent is only installed when the host
    /// is switched on, like the real content script only injects the page
    /// hooks on an active host. Localhost is active unless turned off.
    pub async fn start(
        backend: Arc<dyn NetworkBackend>,
        storage: Arc<dyn ExtensionStorage>,
        tab_id: TabId,
        host: &str,
    ) -> Result<Self> {
        let window = Arc::new(WindowChannel::new());
        let hub = Arc::new(ExtensionHub::new());

        // One messenger per execution context, all over the same shared
        // transports.
        let content_messenger = Arc::new(Messenger::new(window.clone(), hub.clone()));
        let page_messenger = Arc::new(Messenger::new(window.clone(), hub.clone()));

        let provider = Arc::new(StorageStoreProvider::new(storage));
        let active = provider.host_active(host).await?;
        let provider: Arc<dyn MockStoreProvider> = provider;
        let (content, content_listener) =
            ContentScript::boot(content_messenger, provider, tab_id, host).await?;

        let hooks = Arc::new(HookRegistry::new());
        let agent = if active {
            let bus = Arc::new(PageBus::new(page_messenger));
            Some(PageAgent::install(&hooks, bus))
        } else {
            None
        };

        Ok(Self {
            hooks,
            backend,
            window,
            hub,
            tab_id,
            content,
            _agent: agent,
            _content_listener: content_listener,
        })
    }

    /// A fresh XHR facade, as `new XMLHttpRequest()` would produce
    pub fn xhr(&self) -> XhrFacade {
        XhrFacade::new(self.hooks.clone(), self.backend.clone())
    }

    /// The page's fetch entry point
    pub fn fetch_client(&self) -> FetchClient {
        FetchClient::new(self.hooks.clone(), self.backend.clone())
    }

    /// The shared hook registry
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The content-script relay
    pub fn content(&self) -> &ContentScript {
        &self.content
    }

    /// The shared window channel (page and content script)
    pub fn window(&self) -> &Arc<WindowChannel> {
        &self.window
    }

    /// The shared extension hub (runtime and tab messaging)
    pub fn hub(&self) -> &Arc<ExtensionHub> {
        &self.hub
    }

    /// The tab this pipeline is bound to
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }
}
