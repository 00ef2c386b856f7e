//! Injected-script agent
//!
//! Owns the page side of the interception pipeline: it installs one
//! before-hook that asks the content script for a mock (and short-circuits
//! to it when one applies) and one after-hook that ships the finished
//! request/response pair off as a log entry. Everything it sends is
//! best-effort; a content script that never answers leaves the page's
//! network behavior untouched.

mod bus;
mod logs;

pub use bus::PageBus;
pub use logs::{request_log, response_log, UNREADABLE_RESPONSE};

use dashmap::DashMap;
use hook_pipeline::{
    AfterHook, BeforeHook, BeforeVerdict, HookRegistry, ResponsePatch,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;
use wire_types::{MessageKind, MockDefinition, MockQueryReply};

/// The page agent, holding per-request mock bookkeeping
///
/// Created once per document via [`PageAgent::install`]; the hooks it
/// registers live as long as the registry does.
pub struct PageAgent {
    /// Mocks applied by the before-hook, keyed by request uuid, consumed
    /// by the after-hook when it builds the response log
    mocked: Arc<DashMap<String, MockDefinition>>,
}

impl PageAgent {
    /// Register the mock-query before-hook and the logging after-hook
    pub fn install(hooks: &HookRegistry, bus: Arc<PageBus>) -> Self {
        let mocked = Arc::new(DashMap::new());

        let query_bus = bus.clone();
        let query_mocked = mocked.clone();
        hooks.before(BeforeHook::Async(Box::new(move |request| {
            let request_id = Uuid::new_v4().to_string();
            request.correlation_id = Some(request_id.clone());
            let log = request_log(request, &request_id);
            let payload = serde_json::to_value(&log).unwrap_or_else(|_| json!({}));

            let bus = query_bus.clone();
            let mocked = query_mocked.clone();
            Box::pin(async move {
                // The request log goes out immediately; the response log
                // follows from the after-hook under the same id.
                bus.send_log(payload.clone());
                let reply = match bus
                    .post_message(payload, MessageKind::Notification, true)
                    .await
                {
                    Some(reply) => reply,
                    None => return BeforeVerdict::Continue,
                };
                let reply: MockQueryReply = match serde_json::from_value(reply) {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!("MOKKU: malformed mock reply: {}", err);
                        return BeforeVerdict::Continue;
                    }
                };

                match reply.mock_response {
                    Some(mock) => {
                        debug!(status = mock.status, "mock applies, fabricating response");
                        if let Some(delay) = mock.delay {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                        let mut patch = ResponsePatch::status(mock.status)
                            .with_text(mock.response.clone().unwrap_or_default());
                        match mock.headers {
                            Some(ref headers) => {
                                for header in headers {
                                    patch = patch.with_header(
                                        header.name.to_lowercase(),
                                        header.value.clone(),
                                    );
                                }
                            }
                            // A mock without headers still looks like JSON
                            // to the page.
                            None => {
                                patch = patch.with_header(
                                    "content-type",
                                    "application/json; charset=UTF-8",
                                );
                            }
                        }
                        mocked.insert(request_id, mock);
                        BeforeVerdict::Resolve(patch)
                    }
                    None => BeforeVerdict::Continue,
                }
            })
        })));

        let log_bus = bus;
        let log_mocked = mocked.clone();
        hooks.after(AfterHook::Sync(Box::new(move |request, response| {
            let Some(ref request_id) = request.correlation_id else {
                return;
            };
            let mock = log_mocked.remove(request_id).map(|(_, mock)| mock);
            let log = response_log(request, response, request_id, mock.as_ref());
            match serde_json::to_value(&log) {
                Ok(payload) => log_bus.send_log(payload),
                Err(err) => {
                    warn!("MOKKU: could not serialize log: {}", err);
                    // Degraded status-0 entry so the panel still sees
                    // the request complete.
                    log_bus.send_log(json!({
                        "id": request_id,
                        "request": {
                            "url": request.url,
                            "method": request.method,
                            "headers": [],
                        },
                        "response": { "status": 0, "headers": [] },
                    }));
                }
            }
        })));

        Self { mocked }
    }

    /// Number of mocked requests whose response log has not gone out yet
    pub fn in_flight_mocks(&self) -> usize {
        self.mocked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_pipeline::{
        run_after_chain, run_before_chain, ChainOutcome, RequestDescriptor, ResponseDescriptor,
    };
    use message_bus::{ExtensionHub, ListenerHandle, Messenger, WindowChannel};
    use pretty_assertions::assert_eq;
    use wire_types::{BusMessage, Entity, HeaderEntry, NetworkLog};

    struct Harness {
        window: Arc<WindowChannel>,
        hooks: Arc<HookRegistry>,
        agent: PageAgent,
        _content: ListenerHandle,
    }

    /// Stand-in content script: replies with the given mock for any query
    /// whose URL matches, `{}` otherwise, and ignores logs.
    fn harness(mock_for_url: Option<(String, MockDefinition)>) -> Harness {
        let window = Arc::new(WindowChannel::new());
        let hub = Arc::new(ExtensionHub::new());
        let messenger = Arc::new(Messenger::new(window.clone(), hub));

        let replier = messenger.clone();
        let content = messenger.listen(Entity::Content, None, move |message| {
            let Some(id) = message.id else { return };
            let log: NetworkLog = match serde_json::from_value(message.message) {
                Ok(log) => log,
                Err(_) => return,
            };
            let reply = match &mock_for_url {
                Some((url, mock)) if *url == log.request.url => MockQueryReply {
                    mock_response: Some(mock.clone()),
                },
                _ => MockQueryReply::default(),
            };
            let _ = replier.send(
                BusMessage::with_id(
                    id,
                    serde_json::to_value(&reply).unwrap(),
                    Entity::Content,
                    Entity::Hook,
                    MessageKind::Hook,
                ),
                None,
            );
        });

        let hooks = Arc::new(HookRegistry::new());
        let bus = Arc::new(PageBus::new(messenger));
        let agent = PageAgent::install(&hooks, bus);
        Harness {
            window,
            hooks,
            agent,
            _content: content,
        }
    }

    async fn drive_before(
        harness: &Harness,
        request: &mut RequestDescriptor,
        response: &mut ResponseDescriptor,
    ) -> ChainOutcome {
        tokio::task::yield_now().await;
        run_before_chain(&harness.hooks.before_hooks(), request, response).await
    }

    #[tokio::test]
    async fn test_mock_reply_short_circuits_the_chain() {
        let mock = MockDefinition::new("GET", "https://a/goals", 201)
            .with_response(r#"{"ok":true}"#);
        let harness = harness(Some(("https://a/goals".to_string(), mock)));

        let mut request = RequestDescriptor::new("GET", "https://a/goals?x=1");
        let mut response = ResponseDescriptor::default();
        let outcome = drive_before(&harness, &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Resolved);
        assert_eq!(response.status, Some(201));
        assert_eq!(response.text.as_deref(), Some(r#"{"ok":true}"#));
        // No headers on the mock: it is presented as JSON.
        assert_eq!(
            response.headers.get("content-type"),
            Some("application/json; charset=UTF-8")
        );
        assert!(request.correlation_id.is_some());
        assert_eq!(harness.agent.in_flight_mocks(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_continues_to_network() {
        let harness = harness(None);

        let mut request = RequestDescriptor::new("GET", "https://a/goals");
        let mut response = ResponseDescriptor::default();
        let outcome = drive_before(&harness, &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Network);
        assert_eq!(response.status, None);
        assert_eq!(harness.agent.in_flight_mocks(), 0);
    }

    #[tokio::test]
    async fn test_after_hook_ships_a_flagged_response_log() {
        let mock = MockDefinition::new("GET", "https://a/goals", 201);
        let harness = harness(Some(("https://a/goals".to_string(), mock)));
        let mut window_rx = harness.window.subscribe();

        let mut request = RequestDescriptor::new("GET", "https://a/goals");
        let mut response = ResponseDescriptor::default();
        drive_before(&harness, &mut request, &mut response).await;
        run_after_chain(&harness.hooks.after_hooks(), &request, &mut response).await;

        // The request log goes out first, then the flagged response log.
        let mut logs = Vec::new();
        while logs.len() < 2 {
            let event = window_rx.recv().await.unwrap();
            if event.message.kind == MessageKind::Log {
                logs.push(serde_json::from_value::<NetworkLog>(event.message.message).unwrap());
            }
        }
        assert!(logs[0].response.is_none());
        let log = logs.pop().unwrap();
        assert_eq!(log.is_mocked, Some(true));
        assert_eq!(log.response.unwrap().status, 201);
        assert_eq!(Some(log.id), request.correlation_id);
        assert_eq!(harness.agent.in_flight_mocks(), 0);
    }

    #[tokio::test]
    async fn test_mock_headers_and_delay_are_applied() {
        let mut mock = MockDefinition::new("GET", "https://a/goals", 200)
            .with_response("body");
        mock.headers = Some(vec![HeaderEntry::new("X-Mock", "yes")]);
        mock.delay = Some(1);
        let harness = harness(Some(("https://a/goals".to_string(), mock)));

        let mut request = RequestDescriptor::new("GET", "https://a/goals");
        let mut response = ResponseDescriptor::default();
        let outcome = drive_before(&harness, &mut request, &mut response).await;

        assert_eq!(outcome, ChainOutcome::Resolved);
        assert_eq!(response.headers.get("x-mock"), Some("yes"));
        // Explicit mock headers suppress the JSON default.
        assert_eq!(response.headers.get("content-type"), None);
    }

    #[tokio::test]
    async fn test_unreachable_content_script_fails_open() {
        let harness = harness(None);
        harness.window.invalidate();

        let mut request = RequestDescriptor::new("GET", "https://a/goals");
        let mut response = ResponseDescriptor::default();
        let outcome = drive_before(&harness, &mut request, &mut response).await;

        // The send failed, the reply resolved empty, the chain falls
        // through to the real network.
        assert_eq!(outcome, ChainOutcome::Network);
    }
}
