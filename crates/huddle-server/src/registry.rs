//! Registry of open sessions.
//!
//! The single serialization point for session membership. Fan-out never
//! iterates the live map; it works on a [`snapshot`](SessionRegistry::snapshot)
//! taken under the read lock, so sessions can join or leave mid-broadcast.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use huddle_core::{SessionId, SessionIdAllocator};
use metrics::gauge;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::metrics::WS_CONNECTIONS_ACTIVE;
use crate::session::Session;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A session with this id is already registered.
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}

/// Open sessions indexed by id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    ids: SessionIdAllocator,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ids: SessionIdAllocator::new(),
        }
    }

    /// Allocate the next session id. Ids are never reused.
    pub fn next_id(&self) -> SessionId {
        self.ids.next_id()
    }

    /// Add a session.
    pub async fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let id = session.id();
        let count = {
            let mut sessions = self.sessions.write().await;
            match sessions.entry(id) {
                Entry::Occupied(_) => return Err(RegistryError::DuplicateSession(id)),
                Entry::Vacant(e) => {
                    let _ = e.insert(session);
                }
            }
            sessions.len()
        };
        gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
        debug!(session_id = %id, count, "session registered");
        Ok(())
    }

    /// Remove a session. Removing an absent id is a no-op returning `None`.
    pub async fn unregister(&self, id: SessionId) -> Option<Arc<Session>> {
        let (removed, count) = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(&id);
            (removed, sessions.len())
        };
        if removed.is_some() {
            gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
            debug!(session_id = %id, count, "session unregistered");
        }
        removed
    }

    /// Look up one session.
    pub async fn find(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Every registered session at this instant.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Every registered session except `excluded`.
    pub async fn snapshot_except(&self, excluded: SessionId) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.id() != excluded)
            .cloned()
            .collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Close and remove every registered session. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, s)| s).collect()
        };
        for session in &drained {
            let _ = session.close();
        }
        gauge!(WS_CONNECTIONS_ACTIVE).set(0.0);
        info!(count = drained.len(), "closed all sessions");
        drained.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use assert_matches::assert_matches;

    fn make_session(registry: &SessionRegistry) -> Arc<Session> {
        let (session, _rx) = Session::with_channel(registry.next_id(), 4);
        let _ = session.open();
        Arc::new(session)
    }

    #[tokio::test]
    async fn register_and_find() {
        let registry = SessionRegistry::new();
        let s = make_session(&registry);
        registry.register(s.clone()).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.find(s.id()).await.unwrap().id(), s.id());
    }

    #[tokio::test]
    async fn duplicate_register_rejected() {
        let registry = SessionRegistry::new();
        let s = make_session(&registry);
        registry.register(s.clone()).await.unwrap();
        assert_matches!(
            registry.register(s.clone()).await,
            Err(RegistryError::DuplicateSession(id)) if id == s.id()
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let s = make_session(&registry);
        registry.register(s.clone()).await.unwrap();
        assert!(registry.unregister(s.id()).await.is_some());
        assert!(registry.unregister(s.id()).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn ids_are_unique_and_increasing() {
        let registry = SessionRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert!(b > a);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_changes() {
        let registry = SessionRegistry::new();
        let a = make_session(&registry);
        let b = make_session(&registry);
        registry.register(a.clone()).await.unwrap();
        registry.register(b.clone()).await.unwrap();

        let snap = registry.snapshot().await;
        let _ = registry.unregister(a.id()).await;
        let c = make_session(&registry);
        registry.register(c).await.unwrap();

        assert_eq!(snap.len(), 2);
        assert_eq!(registry.len().await, 2);
        assert!(registry.find(a.id()).await.is_none());
    }

    #[tokio::test]
    async fn snapshot_except_skips_one() {
        let registry = SessionRegistry::new();
        let a = make_session(&registry);
        let b = make_session(&registry);
        registry.register(a.clone()).await.unwrap();
        registry.register(b.clone()).await.unwrap();
        let snap = registry.snapshot_except(a.id()).await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id(), b.id());
    }

    #[tokio::test]
    async fn close_all_closes_and_empties() {
        let registry = SessionRegistry::new();
        let sessions: Vec<_> = (0..3).map(|_| make_session(&registry)).collect();
        for s in &sessions {
            registry.register(s.clone()).await.unwrap();
        }
        assert_eq!(registry.close_all().await, 3);
        assert!(registry.is_empty().await);
        assert!(sessions.iter().all(|s| s.state() == SessionState::Closing));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_unregister() {
        let registry = Arc::new(SessionRegistry::new());
        let tasks: Vec<_> = (0..100)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let s = make_session(&registry);
                    registry.register(s.clone()).await.unwrap();
                    if i % 2 == 0 {
                        let _ = registry.unregister(s.id()).await;
                    }
                })
            })
            .collect();
        for t in futures::future::join_all(tasks).await {
            t.unwrap();
        }
        assert_eq!(registry.len().await, 50);
    }
}
