//! Per-session receive loop.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use huddle_core::Envelope;
use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::{Frame, Session, TransportError};
use crate::config::ServerConfig;
use crate::dispatch::{DispatchTable, HandlerContext};
use crate::metrics::{
    INBOUND_MALFORMED_TOTAL, SESSION_DURATION_SECONDS, WS_DISCONNECTIONS_TOTAL,
};

/// Knobs for [`run_session`].
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// End the session when a frame is not a valid envelope.
    pub close_on_malformed: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            close_on_malformed: true,
        }
    }
}

impl From<&ServerConfig> for SessionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            close_on_malformed: config.close_on_malformed,
        }
    }
}

/// Why a receive loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame.
    PeerClosed,
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// Reading failed.
    Transport(String),
    /// The peer sent a frame that is not an envelope.
    Malformed,
    /// Closed from the server side (eviction, heartbeat, shutdown).
    ClosedByServer,
}

impl CloseReason {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::StreamEnded => "stream_ended",
            Self::Transport(_) => "transport_error",
            Self::Malformed => "malformed",
            Self::ClosedByServer => "closed_by_server",
        }
    }
}

/// Drive one registered session until it ends.
///
/// Frames are decoded and dispatched strictly one at a time, so a session's
/// handlers run in arrival order. Every exit path funnels into a single
/// teardown that closes the session and removes it from the registry.
#[instrument(skip_all, fields(session_id = %session.id()))]
pub async fn run_session<S>(
    session: Arc<Session>,
    mut inbound: S,
    table: &DispatchTable,
    ctx: &HandlerContext,
    options: SessionOptions,
) -> CloseReason
where
    S: Stream<Item = Result<Frame, TransportError>> + Unpin,
{
    let reason = loop {
        let next = tokio::select! {
            biased;
            () = session.closed() => break CloseReason::ClosedByServer,
            next = inbound.next() => next,
        };

        let text = match next {
            None => break CloseReason::StreamEnded,
            Some(Err(err)) => {
                warn!(error = %err, "read failed");
                break CloseReason::Transport(err.0);
            }
            Some(Ok(frame)) => {
                session.mark_alive();
                match frame {
                    Frame::Text(text) => text,
                    Frame::Binary(bytes) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(e) => {
                            info!(len = e.as_bytes().len(), "ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Frame::Ping | Frame::Pong => continue,
                    Frame::Close => {
                        debug!("peer sent close frame");
                        break CloseReason::PeerClosed;
                    }
                }
            }
        };

        let envelope = match Envelope::decode(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                counter!(INBOUND_MALFORMED_TOTAL).increment(1);
                warn!(error = %err, len = text.len(), "malformed envelope");
                if options.close_on_malformed {
                    break CloseReason::Malformed;
                }
                continue;
            }
        };

        if let Err(err) = table.dispatch(session.id(), envelope, ctx).await {
            warn!(error = %err, "dispatch failed");
        }
    };

    let _ = session.close();
    let removed = ctx.delivery.registry().unregister(session.id()).await.is_some();
    session.mark_closed();

    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    histogram!(SESSION_DURATION_SECONDS).record(session.age().as_secs_f64());
    info!(reason = reason.as_str(), removed, "session closed");
    reason
}
