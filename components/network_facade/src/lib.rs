//! Page-facing network facades
//!
//! Drop-in replacements for the page's two network entry points, XHR and
//! `fetch`, both funneled through a shared [`HookRegistry`]. A before-hook
//! may resolve a response without the network ever being touched; the
//! after-chain observes every outcome, including transport failures.
//!
//! The real transport sits behind the [`NetworkBackend`] trait so the
//! facades stay testable without a browser.

mod backend;
mod events;
mod fetch;
mod xhr;

pub use backend::{BackendResponse, InMemoryBackend, NetworkBackend, TransportError};
pub use events::{EventEmitter, EventListener, FacadeEvent, FacadeEventKind, ListenerToken};
pub use fetch::{FetchClient, FetchError, FetchInit, FetchRequest, FetchResponse};
pub use xhr::{XhrFacade, DONE, HEADERS_RECEIVED, LOADING, OPENED, UNSENT};

// Intentionally re-exported so facade users do not need a direct
// hook_pipeline dependency for the common path.
pub use hook_pipeline::{
    AfterHook, BeforeHook, BeforeVerdict, Body, ChainOutcome, HookRegistry, RequestDescriptor,
    ResponseDescriptor, ResponsePatch,
};
