// Log payload carried in LOG messages and mock-query exchanges

use crate::mock::MockDefinition;
use serde::{Deserialize, Serialize};

/// A single name/value header pair as it appears in log payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderEntry {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

impl HeaderEntry {
    /// Create a header entry
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request half of a log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestLog {
    /// Request URL with the query string stripped
    pub url: String,
    /// Request body, already stringified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// JSON-encoded parse of the query string, if one was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<String>,
    /// HTTP method, defaults to GET at the logging site
    pub method: String,
    /// Request headers
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
}

/// Response half of a log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseLog {
    /// Response status code
    pub status: u16,
    /// Response body text, if readable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Response headers
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
}

/// The `message` payload of a `LOG` message
///
/// `id` correlates the request-side and response-side log entries for one
/// network request; it is a uuid, unrelated to bus correlation ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLog {
    /// Request descriptor as seen before the network call
    pub request: RequestLog,
    /// Response, present only on response-side entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseLog>,
    /// Per-request uuid
    pub id: String,
    /// Set by the relay when an active mock applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mocked: Option<bool>,
    /// Getter path of the applied mock within the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_path: Option<String>,
    /// Mock carried back to the hook on a query reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_response: Option<MockDefinition>,
}

/// Reply payload of a mock-query exchange
///
/// Serializes to `{}` when no mock applies, which the hook pipeline
/// treats as "continue to the network".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MockQueryReply {
    /// The applicable active mock, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_response: Option<MockDefinition>,
}
