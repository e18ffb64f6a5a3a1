//! Unicast and broadcast delivery.
//!
//! Each call encodes the envelope once and enqueues the same text on every
//! target. A closed target is closed and evicted; a full target loses this
//! one message. Neither stops delivery to the rest.

use std::sync::Arc;

use huddle_core::{Envelope, SessionId};
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::{MESSAGES_SENT_TOTAL, WS_BROADCAST_DROPS_TOTAL, WS_EVICTIONS_TOTAL};
use crate::registry::SessionRegistry;
use crate::session::{SendError, Session};

/// Outcome of one delivery call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sessions the message was addressed to.
    pub targets: usize,
    /// Sessions that accepted it.
    pub delivered: usize,
    /// Sessions whose queue was full.
    pub dropped: usize,
    /// Sessions found closed and removed.
    pub evicted: usize,
}

/// Fan-out over a [`SessionRegistry`].
pub struct DeliveryEngine {
    registry: Arc<SessionRegistry>,
}

impl DeliveryEngine {
    /// Deliver through `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Send to one session. An unknown id is a logged no-op.
    pub async fn unicast(&self, id: SessionId, envelope: &Envelope) -> DeliveryReport {
        let Some(session) = self.registry.find(id).await else {
            debug!(session_id = %id, tag = envelope.message_type(), "unicast target not registered");
            return DeliveryReport::default();
        };
        self.deliver(vec![session], envelope).await
    }

    /// Send to every registered session, the originator included.
    pub async fn broadcast(&self, envelope: &Envelope) -> DeliveryReport {
        let targets = self.registry.snapshot().await;
        self.deliver(targets, envelope).await
    }

    /// Send to every registered session except `excluded`.
    pub async fn broadcast_except(&self, excluded: SessionId, envelope: &Envelope) -> DeliveryReport {
        let targets = self.registry.snapshot_except(excluded).await;
        self.deliver(targets, envelope).await
    }

    async fn deliver(&self, targets: Vec<Arc<Session>>, envelope: &Envelope) -> DeliveryReport {
        let tag = envelope.message_type();
        let mut report = DeliveryReport {
            targets: targets.len(),
            ..DeliveryReport::default()
        };
        let text: Arc<str> = match envelope.encode() {
            Ok(text) => text.into(),
            Err(e) => {
                warn!(tag, error = %e, "failed to encode envelope");
                return report;
            }
        };

        for session in targets {
            match session.send(text.clone()) {
                Ok(()) => report.delivered += 1,
                Err(SendError::Full) => {
                    report.dropped += 1;
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(session_id = %session.id(), tag, "outbound queue full, message dropped");
                }
                Err(SendError::Closed) => {
                    report.evicted += 1;
                    counter!(WS_EVICTIONS_TOTAL).increment(1);
                    let _ = session.close();
                    let _ = self.registry.unregister(session.id()).await;
                    debug!(session_id = %session.id(), tag, "evicted closed session");
                }
            }
        }

        counter!(MESSAGES_SENT_TOTAL, "type" => tag.to_owned()).increment(report.delivered as u64);
        debug!(
            tag,
            targets = report.targets,
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted,
            "delivered"
        );
        report
    }
}
