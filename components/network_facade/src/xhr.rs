// XMLHttpRequest facade driven through the hook chains

use crate::backend::{BackendResponse, NetworkBackend, TransportError};
use crate::events::{EventEmitter, FacadeEventKind};
use hook_pipeline::{
    run_after_chain, run_before_chain, Body, ChainOutcome, HookRegistry, RequestDescriptor,
    ResponseDescriptor,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// readyState: object created, `open` not yet called
pub const UNSENT: u8 = 0;
/// readyState: `open` has been called
pub const OPENED: u8 = 1;
/// readyState: response headers are available
pub const HEADERS_RECEIVED: u8 = 2;
/// readyState: response body is downloading
pub const LOADING: u8 = 3;
/// readyState: the request finished (or failed)
pub const DONE: u8 = 4;

/// Per-request facade state behind one lock
struct XhrState {
    request: RequestDescriptor,
    response: ResponseDescriptor,
    /// Internal monotone transition counter
    current_state: u8,
    /// Page-visible readyState; diverges from `current_state` only via the
    /// legacy post-error reset
    ready_state: u8,
    has_error: bool,
    // Page-visible mirrors, rewritten at each readiness transition
    status: u16,
    status_text: String,
    response_text: String,
    response_url: String,
    // Ambient settings the page may assign before `send`
    response_type: Option<String>,
    timeout: Option<Duration>,
    with_credentials: bool,
    mime_override: Option<String>,
}

impl Default for XhrState {
    fn default() -> Self {
        Self {
            request: RequestDescriptor::default(),
            response: ResponseDescriptor::default(),
            current_state: UNSENT,
            ready_state: UNSENT,
            has_error: false,
            status: 0,
            status_text: String::new(),
            response_text: String::new(),
            response_url: String::new(),
            response_type: None,
            timeout: None,
            with_credentials: false,
            mime_override: None,
        }
    }
}

/// Drop-in replacement for the page's XHR object
///
/// Behaviorally indistinguishable from the native object for page code
/// that does not probe for interception: same method surface, same event
/// surface, same readiness transitions in the same order. Every request
/// funnels through the shared [`HookRegistry`] before and after the real
/// network call.
///
/// Cloning yields a handle onto the same underlying request, which is how
/// `abort()` can be issued while `send` is in flight.
#[derive(Clone)]
pub struct XhrFacade {
    hooks: Arc<HookRegistry>,
    backend: Arc<dyn NetworkBackend>,
    events: Arc<EventEmitter>,
    upload: Arc<EventEmitter>,
    state: Arc<Mutex<XhrState>>,
    /// ABORTED sentinel
    aborted: Arc<AtomicBool>,
    /// Whether a real transport request is in flight
    transiting: Arc<AtomicBool>,
    abort_signal: Arc<Notify>,
}

impl XhrFacade {
    /// Create a facade over the shared hook registry and a backend
    pub fn new(hooks: Arc<HookRegistry>, backend: Arc<dyn NetworkBackend>) -> Self {
        Self {
            hooks,
            backend,
            events: Arc::new(EventEmitter::new()),
            upload: Arc::new(EventEmitter::new()),
            state: Arc::new(Mutex::new(XhrState::default())),
            aborted: Arc::new(AtomicBool::new(false)),
            transiting: Arc::new(AtomicBool::new(false)),
            abort_signal: Arc::new(Notify::new()),
        }
    }

    /// The facade's event surface (`onreadystatechange` and friends)
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// The upload event surface
    pub fn upload(&self) -> &EventEmitter {
        &self.upload
    }

    /// Initialize a request, resetting all per-request state
    ///
    /// Does not touch the real transport; only `send` does.
    pub fn open(&self, method: &str, url: &str, is_async: bool) {
        {
            let mut st = self.state.lock();
            st.current_state = UNSENT;
            st.ready_state = UNSENT;
            st.has_error = false;
            let mut request = RequestDescriptor::new(method, url);
            request.is_async = is_async;
            st.request = request;
            st.response = ResponseDescriptor::default();
            st.status = 0;
            st.status_text.clear();
            st.response_text.clear();
            st.response_url.clear();
        }
        self.aborted.store(false, Ordering::SeqCst);
        self.transiting.store(false, Ordering::SeqCst);
        self.advance_states(OPENED);
    }

    /// Add a request header
    ///
    /// Cumulative per name: repeated calls append `", "`-joined values,
    /// and the first literal casing of a name is kept for display.
    pub fn set_request_header(&self, name: &str, value: &str) {
        self.state.lock().request.headers.append(name, value);
    }

    /// Assign the request timeout
    pub fn set_timeout(&self, timeout: Duration) {
        self.state.lock().timeout = Some(timeout);
    }

    /// Assign the response type hint
    pub fn set_response_type(&self, response_type: &str) {
        self.state.lock().response_type = Some(response_type.to_string());
    }

    /// Assign the credentials flag
    pub fn set_with_credentials(&self, with_credentials: bool) {
        self.state.lock().with_credentials = with_credentials;
    }

    /// Force the response to be interpreted under a different MIME type
    pub fn override_mime_type(&self, mime: &str) {
        self.state.lock().mime_override = Some(mime.to_string());
    }

    /// Issue the request through the before-chain and, if no hook resolves
    /// a response, the real network
    pub async fn send(&self, body: Body) {
        let before_hooks = self.hooks.before_hooks();

        // Read ambient xhr settings before hooking.
        let mut request = {
            let mut st = self.state.lock();
            st.request.body = body;
            st.request.response_type = st.response_type.clone();
            st.request.timeout = st.timeout;
            st.request.with_credentials = st.with_credentials;
            st.request.clone()
        };
        let mut response = self.state.lock().response.clone();

        let outcome = run_before_chain(&before_hooks, &mut request, &mut response).await;
        {
            let mut st = self.state.lock();
            st.request = request.clone();
            st.response = response;
        }

        match outcome {
            ChainOutcome::Resolved => self.complete().await,
            ChainOutcome::Head => self.advance_states(HEADERS_RECEIVED),
            ChainOutcome::Progress => self.advance_states(LOADING),
            ChainOutcome::Network => self.perform_network(request).await,
        }
    }

    /// Cancel the request, best-effort
    ///
    /// If the real transport call is in flight it is interrupted and the
    /// abort surfaces through the normal error path; otherwise the abort
    /// event is synthesized directly. A hook that is mid-flight is not
    /// interrupted.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.state.lock().has_error = true;
        if self.transiting.load(Ordering::SeqCst) {
            // The in-flight send emits the abort event for us.
            self.abort_signal.notify_waiters();
        } else {
            self.events.dispatch(FacadeEventKind::Abort);
        }
    }

    /// Current page-visible readyState
    pub fn ready_state(&self) -> u8 {
        self.state.lock().ready_state
    }

    /// Response status code (0 until headers are received)
    pub fn status(&self) -> u16 {
        self.state.lock().status
    }

    /// Response status text
    pub fn status_text(&self) -> String {
        self.state.lock().status_text.clone()
    }

    /// Response body text
    pub fn response_text(&self) -> String {
        self.state.lock().response_text.clone()
    }

    /// Final (post-redirect) response URL
    pub fn response_url(&self) -> String {
        self.state.lock().response_url.clone()
    }

    /// Case-insensitive single response header lookup
    pub fn get_response_header(&self, name: &str) -> Option<String> {
        self.state.lock().response.headers.get(name).map(String::from)
    }

    /// All response headers as the CRLF-joined raw string
    pub fn get_all_response_headers(&self) -> String {
        self.state.lock().response.headers.to_raw_string()
    }

    // ------------------------------------------------------------------
    // Private: readiness machine

    /// Emit readiness transitions up to `target`, strictly in order
    fn advance_states(&self, target: u8) {
        loop {
            let current = {
                let mut st = self.state.lock();
                if st.current_state >= target || st.current_state >= DONE {
                    break;
                }
                st.current_state += 1;
                st.ready_state = st.current_state;
                if st.current_state == HEADERS_RECEIVED {
                    Self::write_head(&mut st);
                }
                if st.current_state == DONE {
                    Self::write_head(&mut st);
                    Self::write_body(&mut st);
                }
                st.current_state
            };
            if current == OPENED {
                self.events.dispatch(FacadeEventKind::LoadStart);
            }
            self.events.dispatch(FacadeEventKind::ReadyStateChange);
        }
    }

    /// Run the after-chain, reach DONE, then fire the terminal events
    ///
    /// DONE happens exactly once per request: the after-chain runs to
    /// completion first, then `readystatechange`, then (deferred for async
    /// requests) `load`/`loadend`. On the error path `load` is skipped and
    /// the visible readyState is forced back to 0 after `loadend`, a
    /// deliberately faithful legacy XHR quirk.
    async fn complete(&self) {
        let after_hooks = self.hooks.after_hooks();
        let (request, mut response) = {
            let st = self.state.lock();
            (st.request.clone(), st.response.clone())
        };
        run_after_chain(&after_hooks, &request, &mut response).await;
        self.state.lock().response = response;

        self.advance_states(DONE);

        let (has_error, is_async) = {
            let st = self.state.lock();
            (st.has_error, st.request.is_async)
        };
        if is_async {
            // Delay final events, as the native object fires them from a
            // fresh task.
            tokio::task::yield_now().await;
        }
        if !has_error {
            self.events.dispatch(FacadeEventKind::Load);
        }
        self.events.dispatch(FacadeEventKind::LoadEnd);
        if has_error {
            self.state.lock().ready_state = UNSENT;
        }
    }

    /// Perform the real network call and route its outcome through the
    /// error/success paths
    async fn perform_network(&self, request: RequestDescriptor) {
        if self.aborted.load(Ordering::SeqCst) {
            // Aborted while still inside the before chain: never touch the
            // network; the abort event has already been synthesized.
            self.complete().await;
            return;
        }

        debug!(method = %request.method, url = %request.url, "performing real request");
        self.transiting.store(true, Ordering::SeqCst);
        let has_body = !request.body.is_none();
        if has_body {
            self.upload.dispatch(FacadeEventKind::LoadStart);
        }

        let execute = self.backend.execute(&request);
        let result = match request.timeout.filter(|_| request.is_async) {
            Some(duration) => {
                tokio::select! {
                    res = tokio::time::timeout(duration, execute) => {
                        res.unwrap_or(Err(TransportError::Timeout))
                    }
                    _ = self.abort_signal.notified() => Err(TransportError::Aborted),
                }
            }
            None => {
                tokio::select! {
                    res = execute => res,
                    _ = self.abort_signal.notified() => Err(TransportError::Aborted),
                }
            }
        };
        self.transiting.store(false, Ordering::SeqCst);

        match result {
            Ok(native) => {
                {
                    let mut st = self.state.lock();
                    Self::read_head(&mut st, &native);
                    Self::read_body(&mut st, native);
                }
                if has_body {
                    self.upload.dispatch(FacadeEventKind::Load);
                    self.upload.dispatch(FacadeEventKind::LoadEnd);
                }
                self.complete().await;
            }
            Err(err) => {
                {
                    let mut st = self.state.lock();
                    st.has_error = true;
                    if st.response.status.is_none() {
                        st.response.status = Some(0);
                    }
                    st.response.error = Some(err.to_string());
                }
                if has_body {
                    self.upload.dispatch(FacadeEventKind::LoadEnd);
                }
                let kind = match err {
                    TransportError::Timeout => FacadeEventKind::Timeout,
                    TransportError::Aborted => FacadeEventKind::Abort,
                    TransportError::Failure(_) => FacadeEventKind::Error,
                };
                self.events.dispatch(kind);
                self.complete().await;
            }
        }
    }

    /// Pull status line and headers from the real response
    ///
    /// Response headers are first-write-wins per name: a hook-supplied
    /// header is not clobbered by the network's.
    fn read_head(st: &mut XhrState, native: &BackendResponse) {
        if st.response.status.is_none() {
            st.response.status = Some(native.status);
        }
        if st.response.status_text.is_empty() {
            st.response.status_text = native.status_text.clone();
        }
        for (name, value) in native.headers.iter() {
            st.response.headers.set_if_absent(name.to_lowercase(), value);
        }
    }

    /// Pull the body from the real response per the responseType hint
    fn read_body(st: &mut XhrState, native: BackendResponse) {
        let as_text = match st.request.response_type.as_deref() {
            None | Some("") | Some("text") | Some("document") => true,
            _ => st.mime_override.is_some(),
        };
        if as_text {
            st.response.text = Some(String::from_utf8_lossy(&native.body).into_owned());
        }
        st.response.data = Some(native.body);
        if let Some(final_url) = native.final_url {
            st.response.final_url = Some(final_url);
        }
    }

    /// Mirror status line into the page-visible fields
    fn write_head(st: &mut XhrState) {
        st.status = st.response.status.unwrap_or(0);
        st.status_text = st.response.status_text.clone();
    }

    /// Mirror body fields into the page-visible fields
    fn write_body(st: &mut XhrState) {
        st.response_text = st.response.text.clone().unwrap_or_default();
        st.response_url = st.response.final_url.clone().unwrap_or_default();
    }
}
