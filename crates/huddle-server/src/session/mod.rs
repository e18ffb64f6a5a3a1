//! Per-connection session state.
//!
//! A [`Session`] is shared between the registry, the delivery engine, the
//! session's own receive loop and its transport writer. Outbound text goes
//! through a bounded queue drained by the writer; `send` never blocks.

mod frame;
mod receive;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use huddle_core::SessionId;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

pub use frame::{Frame, TransportError};
pub use receive::{CloseReason, SessionOptions, run_session};

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, handshake not finished.
    Connecting,
    /// Registered and exchanging messages.
    Open,
    /// Close requested; waiting for teardown.
    Closing,
    /// Torn down. Terminal.
    Closed,
}

/// Why a send did not enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The session is closing or its writer is gone.
    #[error("session is closed")]
    Closed,
    /// The outbound queue is full; the message was dropped.
    #[error("outbound queue is full")]
    Full,
}

/// One live client connection.
pub struct Session {
    id: SessionId,
    state: Mutex<SessionState>,
    tx: mpsc::Sender<Arc<str>>,
    cancel: CancellationToken,
    /// When the transport was accepted.
    pub connected_at: Instant,
    last_activity: Mutex<tokio::time::Instant>,
    dropped_messages: AtomicU64,
}

impl Session {
    /// Create a session in the `Connecting` state.
    pub fn new(id: SessionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: Mutex::new(SessionState::Connecting),
            tx,
            cancel: CancellationToken::new(),
            connected_at: now,
            last_activity: Mutex::new(tokio::time::Instant::now()),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Create a session and its outbound queue.
    pub fn with_channel(id: SessionId, buffer: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(id, tx), rx)
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the session is `Open`.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// `Connecting -> Open`. Returns `false` from any other state.
    pub fn open(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Connecting {
            *state = SessionState::Open;
            true
        } else {
            false
        }
    }

    /// Request close.
    ///
    /// `Open` moves to `Closing`, `Connecting` goes straight to `Closed`.
    /// Cancels the session token so the receive loop and writer wind down.
    /// Idempotent; returns whether this call changed the state.
    pub fn close(&self) -> bool {
        let changed = {
            let mut state = self.state.lock();
            match *state {
                SessionState::Open => {
                    *state = SessionState::Closing;
                    true
                }
                SessionState::Connecting => {
                    *state = SessionState::Closed;
                    true
                }
                SessionState::Closing | SessionState::Closed => false,
            }
        };
        self.cancel.cancel();
        changed
    }

    /// Mark teardown complete.
    pub(crate) fn mark_closed(&self) {
        *self.state.lock() = SessionState::Closed;
        self.cancel.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Whether close has been requested.
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Enqueue one encoded frame for the writer.
    pub fn send(&self, message: Arc<str>) -> Result<(), SendError> {
        if self.is_closing() {
            return Err(SendError::Closed);
        }
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Messages dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity (any frame, including pongs).
    pub fn mark_alive(&self) {
        *self.last_activity.lock() = tokio::time::Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
