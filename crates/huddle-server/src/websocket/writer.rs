//! Outbound writer task with server-initiated heartbeat.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::session::Session;

/// Ping cadence and liveness deadline.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Time between pings.
    pub interval: Duration,
    /// Close a peer silent for longer than this.
    pub timeout: Duration,
}

impl From<&ServerConfig> for Heartbeat {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.heartbeat_interval(),
            timeout: config.heartbeat_timeout(),
        }
    }
}

/// Outcome of a single bounded write.
enum Write {
    Sent,
    /// The session closed while the write was pending.
    Cancelled,
    /// The peer did not accept the frame before the deadline.
    Stalled,
    Failed(String),
}

/// Send one frame, giving up when the session closes or `deadline` passes.
async fn write_frame<S>(
    sink: &mut S,
    frame: Message,
    session: &Session,
    deadline: Duration,
) -> Write
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    tokio::select! {
        biased;
        () = session.closed() => Write::Cancelled,
        res = tokio::time::timeout(deadline, sink.send(frame)) => match res {
            Ok(Ok(())) => Write::Sent,
            Ok(Err(e)) => Write::Failed(e.to_string()),
            Err(_) => Write::Stalled,
        },
    }
}

/// Drain `rx` into `sink` until the session closes.
///
/// Any write failure, a missed heartbeat, or a peer that stops accepting
/// frames for longer than the heartbeat timeout closes the session. On
/// close, whatever is already queued is flushed before the close frame,
/// all within one heartbeat timeout.
pub async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<str>>,
    session: Arc<Session>,
    heartbeat: Heartbeat,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval(heartbeat.interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        let frame = tokio::select! {
            biased;
            () = session.closed() => break,
            msg = rx.recv() => {
                let Some(text) = msg else { break };
                Message::Text(text.to_string().into())
            }
            _ = ping.tick() => {
                if session.idle_for() > heartbeat.timeout {
                    warn!(session_id = %session.id(), "client unresponsive for {:?}, disconnecting", heartbeat.timeout);
                    let _ = session.close();
                    break;
                }
                Message::Ping(Vec::new().into())
            }
        };

        match write_frame(&mut sink, frame, &session, heartbeat.timeout).await {
            Write::Sent => {}
            Write::Cancelled => break,
            Write::Stalled => {
                warn!(session_id = %session.id(), "client stopped reading for {:?}, disconnecting", heartbeat.timeout);
                let _ = session.close();
                return;
            }
            Write::Failed(e) => {
                debug!(session_id = %session.id(), error = %e, "write failed");
                let _ = session.close();
                return;
            }
        }
    }

    let drain = async {
        while let Ok(text) = rx.try_recv() {
            if sink.send(Message::Text(text.to_string().into())).await.is_err() {
                return;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    };
    if tokio::time::timeout(heartbeat.timeout, drain).await.is_err() {
        debug!(session_id = %session.id(), "close flush timed out");
    }
}
