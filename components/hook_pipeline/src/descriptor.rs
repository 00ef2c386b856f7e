// Mutable request/response records shared by the facades and the hook chain

use crate::headers::HeaderMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// A request body as captured by a facade
#[derive(Debug, Default)]
pub enum Body {
    /// No body
    #[default]
    None,
    /// Text body
    Text(String),
    /// Opaque binary body
    Bytes(Vec<u8>),
    /// Streaming body; must be drained before the real call is issued,
    /// since a stream a hook inspected cannot be replayed
    Stream(StreamingBody),
}

impl Body {
    /// Best-effort stringification for log payloads
    ///
    /// Unreadable bodies degrade to a placeholder rather than failing.
    pub fn to_log_string(&self) -> Option<String> {
        match self {
            Body::None => None,
            Body::Text(text) => Some(text.clone()),
            Body::Bytes(bytes) => Some(
                String::from_utf8(bytes.clone())
                    .unwrap_or_else(|_| "Unsupported body type!".to_string()),
            ),
            Body::Stream(_) => Some("Unsupported body type!".to_string()),
        }
    }

    /// Whether there is any body at all
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }
}

impl Clone for Body {
    fn clone(&self) -> Self {
        match self {
            Body::None => Body::None,
            Body::Text(t) => Body::Text(t.clone()),
            Body::Bytes(b) => Body::Bytes(b.clone()),
            // A stream cannot be duplicated; the clone sees no body.
            Body::Stream(_) => Body::None,
        }
    }
}

/// Chunked request body delivered over a channel
#[derive(Debug)]
pub struct StreamingBody {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl StreamingBody {
    /// Wrap a chunk receiver
    pub fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// Create a stream plus the sender that feeds it
    pub fn channel() -> (mpsc::UnboundedSender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Read every chunk and assemble the body as text
    pub async fn drain_to_text(mut self) -> String {
        let mut buf = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            buf.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// One in-flight request as seen by the facade and the hook chain
///
/// Created when `open`/`send` (XHR) or a fetch invocation begins, mutated
/// by before-hooks, discarded once the terminal response or error has
/// been delivered to the page.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    /// HTTP method, uppercase
    pub method: String,
    /// Full request URL
    pub url: String,
    /// Request body
    pub body: Body,
    /// Request headers
    pub headers: HeaderMap,
    /// Whether the request is asynchronous; synchronous requests skip
    /// async hooks on both chains
    pub is_async: bool,
    /// Request timeout, if one was set on the facade
    pub timeout: Option<Duration>,
    /// Response type hint (`responseType` on XHR)
    pub response_type: Option<String>,
    /// Whether credentials are included
    pub with_credentials: bool,
    /// Free-form slot hooks use to attach a correlation id
    pub correlation_id: Option<String>,
}

impl RequestDescriptor {
    /// Create a descriptor for a method/URL pair
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            is_async: true,
            ..Default::default()
        }
    }
}

/// The response record, assembled incrementally as data becomes available
#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptor {
    /// Status code; `None` until headers are known
    pub status: Option<u16>,
    /// Status text
    pub status_text: String,
    /// Response headers, first-write-wins per name
    pub headers: HeaderMap,
    /// Body as text, when textual
    pub text: Option<String>,
    /// Opaque body data for non-text response types
    pub data: Option<Vec<u8>>,
    /// Post-redirect URL
    pub final_url: Option<String>,
    /// Set when the outcome is a transport-level failure; after-hooks
    /// observe the error but cannot suppress it
    pub error: Option<String>,
}

impl ResponseDescriptor {
    /// Whether a transport error has been recorded
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A (possibly partial) response supplied by a before-hook
///
/// Merging a patch is destructive per field: whatever the patch carries
/// overwrites the accumulated response, and patch headers win per name.
#[derive(Debug, Clone, Default)]
pub struct ResponsePatch {
    /// Status code, if the patch supplies one
    pub status: Option<u16>,
    /// Status text
    pub status_text: Option<String>,
    /// Body text
    pub text: Option<String>,
    /// Opaque body data
    pub data: Option<Vec<u8>>,
    /// Headers to merge in
    pub headers: HeaderMap,
}

impl ResponsePatch {
    /// A patch carrying only a status code
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Set the body text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Merge this patch into the accumulated response
    pub fn merge_into(&self, response: &mut ResponseDescriptor) {
        if let Some(status) = self.status {
            response.status = Some(status);
        }
        if let Some(ref status_text) = self.status_text {
            response.status_text = status_text.clone();
        }
        if let Some(ref text) = self.text {
            response.text = Some(text.clone());
        }
        if let Some(ref data) = self.data {
            response.data = Some(data.clone());
        } else if let Some(ref text) = self.text {
            // A hook-provided body doubles as the opaque data view.
            response.data = Some(text.clone().into_bytes());
        }
        response.headers.merge_from(&self.headers);
    }
}
