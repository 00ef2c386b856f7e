// Mock definitions as stored by the panel and consumed by the relay

use crate::log::HeaderEntry;
use serde::{Deserialize, Serialize};

/// A developer-authored mock, owned by the panel's store
///
/// The core only needs enough of this shape to resolve "does an active
/// mock apply to (url, method)" and to fabricate a response from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MockDefinition {
    /// HTTP method the mock applies to
    pub method: String,
    /// Literal URL or a `/:param` pattern when `dynamic` is set
    pub url: String,
    /// Status code of the fabricated response
    pub status: u16,
    /// Response body, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Response headers; absent means the default content type applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderEntry>>,
    /// Artificial delay before the response is delivered (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Inactive mocks are skipped entirely during resolution
    #[serde(default)]
    pub active: bool,
    /// Whether `url` is a pattern rather than a literal
    #[serde(default)]
    pub dynamic: bool,
}

impl MockDefinition {
    /// Convenience constructor for a literal-URL mock
    pub fn new(method: impl Into<String>, url: impl Into<String>, status: u16) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status,
            response: None,
            headers: None,
            delay: None,
            active: true,
            dynamic: false,
        }
    }

    /// Set the response body
    pub fn with_response(mut self, body: impl Into<String>) -> Self {
        self.response = Some(body.into());
        self
    }

    /// Mark the mock as a dynamic (pattern) mock
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Set the active flag
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let mock = MockDefinition::new("GET", "https://api.example.com/goals", 201)
            .with_response(r#"{"ok":true}"#)
            .active(false);

        assert_eq!(mock.method, "GET");
        assert_eq!(mock.status, 201);
        assert!(!mock.active);
        assert!(!mock.dynamic);
    }

    #[test]
    fn test_wire_shape_omits_absent_fields() {
        let mock = MockDefinition::new("GET", "https://a/b", 200);
        let value = serde_json::to_value(&mock).unwrap();

        assert!(value.get("response").is_none());
        assert!(value.get("headers").is_none());
        assert!(value.get("delay").is_none());
        assert_eq!(value["active"], true);
    }

    #[test]
    fn test_deserialize_defaults() {
        let mock: MockDefinition =
            serde_json::from_str(r#"{"method":"GET","url":"https://a/b","status":200}"#).unwrap();
        assert!(!mock.active);
        assert!(!mock.dynamic);
    }
}
