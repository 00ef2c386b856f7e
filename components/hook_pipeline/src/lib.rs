//! Ordered request interceptor chains with short-circuit semantics
//!
//! Both network facades (XHR and fetch) share one [`HookRegistry`]. Before
//! the real network call, registered before-hooks run in order and may pass
//! through, supply a full response (short-circuiting the rest of the chain
//! and the network call), or supply a partial response that leaves the
//! request in a headers-received or loading state. After the real call,
//! after-hooks observe the outcome in order; asynchronous after-hooks gate
//! the chain until they complete.
//!
//! Hook calling conventions are declared at registration time as explicit
//! variants rather than inferred from the callable.

pub mod descriptor;
pub mod headers;

pub use descriptor::{Body, RequestDescriptor, ResponseDescriptor, ResponsePatch, StreamingBody};
pub use headers::HeaderMap;

use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Boxed future used by asynchronous hook variants
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What an asynchronous before-hook decided for the current request
#[derive(Debug)]
pub enum BeforeVerdict {
    /// No opinion; the chain advances to the next hook or the network
    Continue,
    /// Supply a (possibly inherited-status) full response
    Resolve(ResponsePatch),
    /// Supply headers only; the request stops at HEADERS_RECEIVED and the
    /// chain does not continue
    Head(ResponsePatch),
    /// Supply a partial body; the request stops at LOADING and the chain
    /// does not continue
    Progress(ResponsePatch),
}

/// A before-hook, run prior to the real network call
pub enum BeforeHook {
    /// Synchronous: a returned patch is a candidate response
    Sync(Box<dyn Fn(&mut RequestDescriptor) -> Option<ResponsePatch> + Send + Sync>),
    /// Asynchronous: mutates the request synchronously, then yields a
    /// verdict. Skipped entirely for synchronous requests.
    Async(Box<dyn Fn(&mut RequestDescriptor) -> BoxFuture<BeforeVerdict> + Send + Sync>),
}

/// An after-hook, run once the outcome (response or error) is known
pub enum AfterHook {
    /// Synchronous observer; the walk advances immediately
    Sync(Box<dyn Fn(&RequestDescriptor, &mut ResponseDescriptor) + Send + Sync>),
    /// Asynchronous observer; the walk blocks until its future completes.
    /// Skipped for synchronous requests.
    Async(Box<dyn Fn(&RequestDescriptor, &mut ResponseDescriptor) -> BoxFuture<()> + Send + Sync>),
}

/// Terminal state of a before-chain walk
#[derive(Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    /// No hook resolved a response; perform the real request
    Network,
    /// A full response was supplied; go straight to DONE
    Resolved,
    /// A headers-only partial response; stop at HEADERS_RECEIVED
    Head,
    /// A partial body; stop at LOADING
    Progress,
}

/// Shared, ordered storage for both hook lists
///
/// Lists are append-mostly: they are written at extension startup and read
/// by every in-flight request. A chain walk operates on a snapshot, so
/// concurrent requests share the lists without locking mid-walk.
#[derive(Default)]
pub struct HookRegistry {
    before: RwLock<Vec<Arc<BeforeHook>>>,
    after: RwLock<Vec<Arc<AfterHook>>>,
}

impl HookRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a before-hook
    pub fn before(&self, hook: BeforeHook) {
        self.before.write().push(Arc::new(hook));
    }

    /// Insert a before-hook at an index (clamped to the list length)
    pub fn before_at(&self, index: usize, hook: BeforeHook) {
        let mut hooks = self.before.write();
        let index = index.min(hooks.len());
        hooks.insert(index, Arc::new(hook));
    }

    /// Append an after-hook
    pub fn after(&self, hook: AfterHook) {
        self.after.write().push(Arc::new(hook));
    }

    /// Insert an after-hook at an index (clamped to the list length)
    pub fn after_at(&self, index: usize, hook: AfterHook) {
        let mut hooks = self.after.write();
        let index = index.min(hooks.len());
        hooks.insert(index, Arc::new(hook));
    }

    /// Snapshot the before-hook list in registration order
    pub fn before_hooks(&self) -> Vec<Arc<BeforeHook>> {
        self.before.read().clone()
    }

    /// Snapshot the after-hook list in registration order
    pub fn after_hooks(&self) -> Vec<Arc<AfterHook>> {
        self.after.read().clone()
    }

    /// Remove every registered hook
    pub fn clear(&self) {
        self.before.write().clear();
        self.after.write().clear();
    }
}

/// Walk the before-chain for one request
///
/// Hooks run strictly in registration order. The first hook to produce a
/// response with a numeric status (its own, or inherited from an earlier
/// partial patch) wins; all later hooks are skipped unconditionally. A
/// patch without any status anywhere is merged but treated as a
/// pass-through. Asynchronous hooks are skipped when the request is
/// synchronous, since they cannot be awaited there.
pub async fn run_before_chain(
    hooks: &[Arc<BeforeHook>],
    request: &mut RequestDescriptor,
    response: &mut ResponseDescriptor,
) -> ChainOutcome {
    for hook in hooks {
        match hook.as_ref() {
            BeforeHook::Sync(f) => {
                if let Some(patch) = f(request) {
                    patch.merge_into(response);
                    if response.status.is_some() {
                        debug!(url = %request.url, "before-chain resolved a response");
                        return ChainOutcome::Resolved;
                    }
                }
            }
            BeforeHook::Async(f) => {
                if !request.is_async {
                    // An async hook cannot be awaited on a sync request.
                    continue;
                }
                let verdict = {
                    let fut = f(request);
                    fut.await
                };
                match verdict {
                    BeforeVerdict::Continue => {}
                    BeforeVerdict::Resolve(patch) => {
                        patch.merge_into(response);
                        if response.status.is_some() {
                            debug!(url = %request.url, "before-chain resolved a response");
                            return ChainOutcome::Resolved;
                        }
                    }
                    BeforeVerdict::Head(patch) => {
                        patch.merge_into(response);
                        return ChainOutcome::Head;
                    }
                    BeforeVerdict::Progress(patch) => {
                        patch.merge_into(response);
                        return ChainOutcome::Progress;
                    }
                }
            }
        }
    }
    ChainOutcome::Network
}

/// Walk the after-chain for one request
///
/// Synchronous observers advance the walk immediately; asynchronous ones
/// gate it until they complete, and are skipped for synchronous requests.
pub async fn run_after_chain(
    hooks: &[Arc<AfterHook>],
    request: &RequestDescriptor,
    response: &mut ResponseDescriptor,
) {
    for hook in hooks {
        match hook.as_ref() {
            AfterHook::Sync(f) => f(request, response),
            AfterHook::Async(f) => {
                if !request.is_async {
                    continue;
                }
                let fut = f(request, response);
                fut.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_sync_hook(
        counter: Arc<AtomicUsize>,
        patch: Option<ResponsePatch>,
    ) -> BeforeHook {
        BeforeHook::Sync(Box::new(move |_request| {
            counter.fetch_add(1, Ordering::SeqCst);
            patch.clone()
        }))
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let registry = HookRegistry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            registry.before(BeforeHook::Sync(Box::new(move |_| {
                order.lock().push(tag);
                None
            })));
        }

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        let mut response = ResponseDescriptor::default();
        let outcome = run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Network);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_first_resolving_hook_short_circuits_the_rest() {
        let registry = HookRegistry::new();
        let h0 = Arc::new(AtomicUsize::new(0));
        let h1 = Arc::new(AtomicUsize::new(0));
        let h2 = Arc::new(AtomicUsize::new(0));

        registry.before(counting_sync_hook(h0.clone(), None));
        registry.before(counting_sync_hook(
            h1.clone(),
            Some(ResponsePatch::status(200).with_text("mocked")),
        ));
        registry.before(counting_sync_hook(h2.clone(), None));

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        let mut response = ResponseDescriptor::default();
        let outcome = run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Resolved);
        assert_eq!(response.status, Some(200));
        assert_eq!(h0.load(Ordering::SeqCst), 1);
        assert_eq!(h1.load(Ordering::SeqCst), 1);
        assert_eq!(h2.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_patch_without_status_is_a_pass_through() {
        let registry = HookRegistry::new();
        registry.before(BeforeHook::Sync(Box::new(|_| {
            Some(ResponsePatch::default().with_header("x-annotated", "1"))
        })));

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        let mut response = ResponseDescriptor::default();
        let outcome = run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Network);
        assert_eq!(response.headers.get("x-annotated"), Some("1"));
    }

    #[tokio::test]
    async fn test_status_inherited_from_prior_partial_patch() {
        let registry = HookRegistry::new();
        registry.before(BeforeHook::Sync(Box::new(|_| {
            // Headerless status, but no resolve yet.
            None
        })));
        registry.before(BeforeHook::Async(Box::new(|_| {
            Box::pin(async {
                BeforeVerdict::Resolve(ResponsePatch::default().with_text("body only"))
            })
        })));

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        let mut response = ResponseDescriptor {
            status: Some(200),
            ..Default::default()
        };
        let outcome = run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

        // Status inherited from the accumulated response resolves the chain.
        assert_eq!(outcome, ChainOutcome::Resolved);
        assert_eq!(response.text.as_deref(), Some("body only"));
    }

    #[tokio::test]
    async fn test_async_hooks_skipped_on_sync_requests() {
        let registry = HookRegistry::new();
        let called = Arc::new(AtomicUsize::new(0));
        let called_in_hook = called.clone();
        registry.before(BeforeHook::Async(Box::new(move |_| {
            called_in_hook.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { BeforeVerdict::Resolve(ResponsePatch::status(200)) })
        })));

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        request.is_async = false;
        let mut response = ResponseDescriptor::default();
        let outcome = run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Network);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_head_and_progress_are_terminal() {
        let tail = Arc::new(AtomicUsize::new(0));

        for (verdict, expected) in [
            (
                BeforeVerdict::Head(ResponsePatch::status(200)),
                ChainOutcome::Head,
            ),
            (
                BeforeVerdict::Progress(ResponsePatch::status(200).with_text("par")),
                ChainOutcome::Progress,
            ),
        ] {
            let registry = HookRegistry::new();
            let verdict = parking_lot::Mutex::new(Some(verdict));
            registry.before(BeforeHook::Async(Box::new(move |_| {
                let verdict = verdict.lock().take().expect("hook called once");
                Box::pin(async move { verdict })
            })));
            registry.before(counting_sync_hook(tail.clone(), None));

            let mut request = RequestDescriptor::new("GET", "https://a/b");
            let mut response = ResponseDescriptor::default();
            let outcome =
                run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

            assert_eq!(outcome, expected);
        }

        // Neither partial outcome let the chain continue.
        assert_eq!(tail.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insertion_index_reorders_hooks() {
        let registry = HookRegistry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let order = order.clone();
            registry.before(BeforeHook::Sync(Box::new(move |_| {
                order.lock().push(tag);
                None
            })));
        }
        let order_front = order.clone();
        registry.before_at(
            0,
            BeforeHook::Sync(Box::new(move |_| {
                order_front.lock().push("front");
                None
            })),
        );

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        let mut response = ResponseDescriptor::default();
        run_before_chain(&registry.before_hooks(), &mut request, &mut response).await;

        assert_eq!(*order.lock(), vec!["front", "a", "b"]);
    }

    #[tokio::test]
    async fn test_after_chain_gates_on_async_observers() {
        let registry = HookRegistry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o = order.clone();
        registry.after(AfterHook::Async(Box::new(move |_, _| {
            let o = o.clone();
            Box::pin(async move {
                tokio::task::yield_now().await;
                o.lock().push("async");
            })
        })));
        let o = order.clone();
        registry.after(AfterHook::Sync(Box::new(move |_, response| {
            o.lock().push("sync");
            response.headers.set("x-observed", "yes");
        })));

        let request = RequestDescriptor::new("GET", "https://a/b");
        let mut response = ResponseDescriptor {
            status: Some(200),
            ..Default::default()
        };
        run_after_chain(&registry.after_hooks(), &request, &mut response).await;

        // The async observer completed before the next hook ran.
        assert_eq!(*order.lock(), vec!["async", "sync"]);
        assert_eq!(response.headers.get("x-observed"), Some("yes"));
    }

    #[tokio::test]
    async fn test_async_after_hooks_skipped_on_sync_requests() {
        let registry = HookRegistry::new();
        let called = Arc::new(AtomicUsize::new(0));
        let called_in_hook = called.clone();
        registry.after(AfterHook::Async(Box::new(move |_, _| {
            called_in_hook.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        })));

        let mut request = RequestDescriptor::new("GET", "https://a/b");
        request.is_async = false;
        let mut response = ResponseDescriptor::default();
        run_after_chain(&registry.after_hooks(), &request, &mut response).await;

        assert_eq!(called.load(Ordering::SeqCst), 0);
    }
}
