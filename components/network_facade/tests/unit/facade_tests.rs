//! Unit tests for the public XHR and fetch surfaces

use network_facade::{
    BackendResponse, Body, FetchClient, FetchError, FetchRequest, HookRegistry, InMemoryBackend,
    XhrFacade, DONE,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn setup() -> (Arc<HookRegistry>, Arc<InMemoryBackend>) {
    (Arc::new(HookRegistry::new()), Arc::new(InMemoryBackend::new()))
}

#[tokio::test]
async fn test_xhr_lifecycle_against_the_backend() {
    let (hooks, backend) = setup();
    backend.route(
        "GET",
        "https://a/items",
        BackendResponse::ok(r#"[1,2,3]"#).with_header("Content-Type", "application/json"),
    );

    let xhr = XhrFacade::new(hooks, backend.clone());
    xhr.open("GET", "https://a/items", true);
    xhr.send(Body::None).await;

    assert_eq!(xhr.ready_state(), DONE);
    assert_eq!(xhr.status(), 200);
    assert_eq!(xhr.response_text(), r#"[1,2,3]"#);
    // Header lookup is case-insensitive.
    assert_eq!(
        xhr.get_response_header("CONTENT-TYPE").as_deref(),
        Some("application/json")
    );
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_xhr_raw_header_block_is_crlf_joined() {
    let (hooks, backend) = setup();
    backend.route(
        "GET",
        "https://a/items",
        BackendResponse::ok("")
            .with_header("Content-Type", "text/plain")
            .with_header("X-Served-By", "unit"),
    );

    let xhr = XhrFacade::new(hooks, backend);
    xhr.open("GET", "https://a/items", true);
    xhr.send(Body::None).await;

    assert_eq!(
        xhr.get_all_response_headers(),
        "content-type: text/plain\r\nx-served-by: unit"
    );
}

#[tokio::test]
async fn test_fetch_ok_is_the_2xx_range() {
    let (hooks, backend) = setup();
    backend.route(
        "GET",
        "https://a/missing",
        BackendResponse::ok("missing").with_status(404, "Not Found"),
    );

    let client = FetchClient::new(hooks, backend);
    let response = client
        .fetch(FetchRequest::new("https://a/missing"))
        .await
        .expect("A 404 is a completed fetch, not an error");

    // Like the native promise: HTTP errors resolve, ok() reports them.
    assert!(!response.ok());
    assert_eq!(response.status, 404);
    assert_eq!(response.text(), "missing");
}

#[tokio::test]
async fn test_fetch_transport_failure_is_an_error() {
    let (hooks, backend) = setup();

    let client = FetchClient::new(hooks, backend);
    let result = client.fetch(FetchRequest::new("https://a/unrouted")).await;

    assert!(matches!(result, Err(FetchError::Network(_))));
}
