//! Unit tests for the facade event emitter

use network_facade::{EventEmitter, EventListener, FacadeEventKind};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_legacy_handler_fires_before_listeners() {
    let emitter = EventEmitter::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let in_listener = order.clone();
    emitter.add_event_listener(FacadeEventKind::Load, move |_| {
        in_listener.lock().push("listener");
    });
    let in_handler = order.clone();
    let onload: EventListener = Arc::new(move |_| {
        in_handler.lock().push("onload");
    });
    emitter.set_handler(FacadeEventKind::Load, Some(onload));

    emitter.dispatch(FacadeEventKind::Load);
    assert_eq!(*order.lock(), vec!["onload", "listener"]);
}

#[test]
fn test_listeners_fire_in_attachment_order_for_their_kind_only() {
    let emitter = EventEmitter::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second"] {
        let seen = order.clone();
        emitter.add_event_listener(FacadeEventKind::LoadEnd, move |_| {
            seen.lock().push(name);
        });
    }
    let seen = order.clone();
    emitter.add_event_listener(FacadeEventKind::Error, move |_| {
        seen.lock().push("error");
    });

    emitter.dispatch(FacadeEventKind::LoadEnd);
    assert_eq!(*order.lock(), vec!["first", "second"]);
}

#[test]
fn test_removed_listener_no_longer_fires() {
    let emitter = EventEmitter::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let seen = order.clone();
    let token = emitter.add_event_listener(FacadeEventKind::Abort, move |_| {
        seen.lock().push("removed");
    });
    let seen = order.clone();
    emitter.add_event_listener(FacadeEventKind::Abort, move |_| {
        seen.lock().push("kept");
    });

    emitter.remove_event_listener(token);
    emitter.dispatch(FacadeEventKind::Abort);
    assert_eq!(*order.lock(), vec!["kept"]);
}

#[test]
fn test_clearing_the_legacy_handler() {
    let emitter = EventEmitter::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let seen = order.clone();
    let ontimeout: EventListener = Arc::new(move |_| {
        seen.lock().push("ontimeout");
    });
    emitter.set_handler(FacadeEventKind::Timeout, Some(ontimeout));
    emitter.set_handler(FacadeEventKind::Timeout, None);

    emitter.dispatch(FacadeEventKind::Timeout);
    assert!(order.lock().is_empty());
}
