// Log payload assembly from request/response descriptors

use hook_pipeline::{HeaderMap, RequestDescriptor, ResponseDescriptor};
use serde_json::{Map, Value};
use wire_types::{HeaderEntry, MockDefinition, NetworkLog, RequestLog, ResponseLog};

/// Placeholder body for responses that cannot be stringified
pub const UNREADABLE_RESPONSE: &str = "Cannot parse response, logging libraries can cause this.";

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Query string parsed into a JSON object, serialized back to a string
///
/// Absent or empty query strings yield `None`; a repeated key keeps its
/// last value, matching how the panel displays parameters.
fn query_params(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or("");
    let mut params = Map::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(name.to_string(), Value::String(value.to_string()));
    }
    if params.is_empty() {
        return None;
    }
    serde_json::to_string(&Value::Object(params)).ok()
}

fn header_entries(headers: &HeaderMap) -> Vec<HeaderEntry> {
    headers
        .iter()
        .map(|(name, value)| HeaderEntry::new(name, value))
        .collect()
}

/// Request-side log entry, sent before the network is consulted
pub fn request_log(request: &RequestDescriptor, id: &str) -> NetworkLog {
    NetworkLog {
        request: RequestLog {
            url: strip_query(&request.url).to_string(),
            body: request.body.to_log_string(),
            query_params: query_params(&request.url),
            method: if request.method.is_empty() {
                "GET".to_string()
            } else {
                request.method.clone()
            },
            headers: header_entries(&request.headers),
        },
        response: None,
        id: id.to_string(),
        is_mocked: None,
        mock_path: None,
        mock_response: None,
    }
}

/// Response-side log entry, sent once the outcome is known
pub fn response_log(
    request: &RequestDescriptor,
    response: &ResponseDescriptor,
    id: &str,
    mock: Option<&MockDefinition>,
) -> NetworkLog {
    let body = response.text.clone().or_else(|| {
        response.data.as_ref().map(|data| {
            String::from_utf8(data.clone()).unwrap_or_else(|_| UNREADABLE_RESPONSE.to_string())
        })
    });

    let mut log = request_log(request, id);
    log.response = Some(ResponseLog {
        status: response.status.unwrap_or(0),
        response: body,
        headers: header_entries(&response.headers),
    });
    if let Some(mock) = mock {
        log.is_mocked = Some(true);
        log.mock_response = Some(mock.clone());
    }
    log
}
