//! Shared fixtures for handler and session tests.

use std::sync::Arc;

use huddle_core::Envelope;
use huddle_store::InMemoryRoomStore;
use tokio::sync::mpsc;

use crate::delivery::DeliveryEngine;
use crate::dispatch::HandlerContext;
use crate::registry::SessionRegistry;
use crate::session::Session;

/// Context backed by an empty in-memory store.
pub fn make_test_context() -> (HandlerContext, Arc<SessionRegistry>) {
    make_test_context_with(InMemoryRoomStore::new())
}

/// Context backed by `store`.
pub fn make_test_context_with(store: InMemoryRoomStore) -> (HandlerContext, Arc<SessionRegistry>) {
    let registry = Arc::new(SessionRegistry::new());
    let delivery = Arc::new(DeliveryEngine::new(registry.clone()));
    (HandlerContext::new(Arc::new(store), delivery), registry)
}

/// Open and register a session with an outbound queue of `buffer`.
pub async fn open_session(
    registry: &SessionRegistry,
    buffer: usize,
) -> (Arc<Session>, mpsc::Receiver<Arc<str>>) {
    let (session, rx) = Session::with_channel(registry.next_id(), buffer);
    assert!(session.open());
    let session = Arc::new(session);
    registry.register(session.clone()).await.unwrap();
    (session, rx)
}

/// Pop and decode the next queued envelope. Panics if none is queued.
pub fn recv_envelope(rx: &mut mpsc::Receiver<Arc<str>>) -> Envelope {
    let text = rx.try_recv().expect("no queued message");
    Envelope::decode(&text).unwrap()
}
