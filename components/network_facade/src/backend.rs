// The seam between the facades and the real network

use async_trait::async_trait;
use dashmap::DashMap;
use hook_pipeline::{HeaderMap, RequestDescriptor};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Transport-level failures, surfaced to the page exactly as the native
/// objects would surface them
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The network call failed outright
    #[error("Network failure: {0}")]
    Failure(String),

    /// The request exceeded its timeout
    #[error("Request timed out")]
    Timeout,

    /// The request was aborted
    #[error("Request aborted")]
    Aborted,
}

/// A completed response from the real network
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Post-redirect URL, when it differs from the request URL
    pub final_url: Option<String>,
}

impl BackendResponse {
    /// A 200 response with a text body
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            headers: HeaderMap::new(),
            body: body.into().into_bytes(),
            final_url: None,
        }
    }

    /// Set the status code and text
    pub fn with_status(mut self, status: u16, status_text: impl Into<String>) -> Self {
        self.status = status;
        self.status_text = status_text.into();
        self
    }

    /// Add a response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Performs the real network call once the before-chain falls through
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Execute the request against the real network
    async fn execute(&self, request: &RequestDescriptor) -> Result<BackendResponse, TransportError>;
}

/// In-memory backend keyed by (method, url), for tests and harnesses
///
/// Unrouted requests fail like an unreachable host would. Every executed
/// request is counted so tests can assert that a mocked request never
/// touched the network.
#[derive(Default)]
pub struct InMemoryBackend {
    routes: DashMap<(String, String), BackendResponse>,
    calls: AtomicUsize,
}

impl InMemoryBackend {
    /// Create a backend with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned response for a method/URL pair
    pub fn route(
        &self,
        method: impl Into<String>,
        url: impl Into<String>,
        response: BackendResponse,
    ) {
        self.routes
            .insert((method.into().to_uppercase(), url.into()), response);
    }

    /// How many requests actually reached this backend
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkBackend for InMemoryBackend {
    async fn execute(&self, request: &RequestDescriptor) -> Result<BackendResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.routes
            .get(&(request.method.clone(), request.url.clone()))
            .map(|r| r.clone())
            .ok_or_else(|| TransportError::Failure(format!("no route for {}", request.url)))
    }
}
