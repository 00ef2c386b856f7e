// fetch() facade: promise-shaped counterpart to the XHR facade

use crate::backend::{NetworkBackend, TransportError};
use hook_pipeline::{
    run_after_chain, run_before_chain, Body, ChainOutcome, HeaderMap, HookRegistry,
    RequestDescriptor, ResponseDescriptor,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A fetch call that could not produce a response
///
/// Mirrors the platform behavior: transport failures reject, HTTP error
/// statuses do not.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transport failed before a response was produced
    #[error("network request failed: {0}")]
    Network(#[from] TransportError),
}

/// The request half of a fetch invocation
#[derive(Debug, Default)]
pub struct FetchRequest {
    /// Full request URL
    pub url: String,
    /// HTTP method, any casing
    pub method: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Body,
    /// Whether credentials are included
    pub with_credentials: bool,
}

impl FetchRequest {
    /// A GET request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            ..Default::default()
        }
    }

    /// Set the method
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Apply an init record on top of this request
    ///
    /// Init fields win wholesale, matching how a second `fetch` argument
    /// overrides a `Request` object: init headers replace same-named
    /// request headers rather than appending to them.
    pub fn with_init(mut self, init: FetchInit) -> Self {
        if let Some(method) = init.method {
            self.method = method;
        }
        if let Some(init_headers) = init.headers {
            for (name, value) in init_headers.iter() {
                self.headers.set(name, value);
            }
        }
        if let Some(body) = init.body {
            self.body = body;
        }
        self
    }
}

/// The optional second argument of a fetch invocation
#[derive(Debug, Default)]
pub struct FetchInit {
    /// Method override
    pub method: Option<String>,
    /// Headers that replace same-named request headers
    pub headers: Option<HeaderMap>,
    /// Body override
    pub body: Option<Body>,
}

/// A completed fetch response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Final (post-redirect) URL
    pub url: String,
}

impl FetchResponse {
    /// Whether the status is in the 2xx range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn from_descriptor(request: &RequestDescriptor, response: ResponseDescriptor) -> Self {
        let body = response
            .data
            .or_else(|| response.text.map(String::into_bytes))
            .unwrap_or_default();
        Self {
            // A partial hook response surfaces to the page as a plain 200.
            status: response.status.unwrap_or(200),
            status_text: response.status_text,
            headers: response.headers,
            body,
            url: response.final_url.unwrap_or_else(|| request.url.clone()),
        }
    }
}

/// Drop-in replacement for the page's `fetch`
///
/// Same hook chains as [`crate::XhrFacade`], but promise-shaped: one call,
/// one `Result`, no readiness machine.
pub struct FetchClient {
    hooks: Arc<HookRegistry>,
    backend: Arc<dyn NetworkBackend>,
}

impl FetchClient {
    /// Create a client over the shared hook registry and a backend
    pub fn new(hooks: Arc<HookRegistry>, backend: Arc<dyn NetworkBackend>) -> Self {
        Self { hooks, backend }
    }

    /// Issue a request through the before-chain and, if no hook resolves a
    /// response, the real network
    pub async fn fetch(&self, input: FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut request = RequestDescriptor::new(input.method, input.url);
        request.headers = input.headers;
        request.with_credentials = input.with_credentials;
        // A stream a hook inspected cannot be replayed, so drain it up
        // front.
        request.body = match input.body {
            Body::Stream(stream) => Body::Text(stream.drain_to_text().await),
            other => other,
        };

        let before_hooks = self.hooks.before_hooks();
        let mut response = ResponseDescriptor::default();
        let outcome = run_before_chain(&before_hooks, &mut request, &mut response).await;

        match outcome {
            ChainOutcome::Resolved | ChainOutcome::Head | ChainOutcome::Progress => {
                // Hook-resolved, including partials: fetch has no readiness
                // machine, so a partial becomes a complete response.
                self.finish(&request, response).await
            }
            ChainOutcome::Network => {
                debug!(method = %request.method, url = %request.url, "performing real request");
                match self.backend.execute(&request).await {
                    Ok(native) => {
                        response.status = Some(native.status);
                        response.status_text = native.status_text;
                        for (name, value) in native.headers.iter() {
                            response.headers.set_if_absent(name.to_lowercase(), value);
                        }
                        response.data = Some(native.body);
                        response.final_url = native.final_url;
                        self.finish(&request, response).await
                    }
                    Err(err) => {
                        // After-hooks observe the failure before the caller
                        // sees the rejection.
                        response.error = Some(err.to_string());
                        let after_hooks = self.hooks.after_hooks();
                        run_after_chain(&after_hooks, &request, &mut response).await;
                        Err(FetchError::Network(err))
                    }
                }
            }
        }
    }

    async fn finish(
        &self,
        request: &RequestDescriptor,
        mut response: ResponseDescriptor,
    ) -> Result<FetchResponse, FetchError> {
        let after_hooks = self.hooks.after_hooks();
        run_after_chain(&after_hooks, request, &mut response).await;
        Ok(FetchResponse::from_descriptor(request, response))
    }
}
