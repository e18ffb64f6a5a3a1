//! `GET /ws` upgrade handler: the connection acceptor.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use metrics::counter;
use tracing::{debug, error, info, warn};

use super::writer::{Heartbeat, run_writer};
use crate::metrics::{WS_CONNECTIONS_REJECTED_TOTAL, WS_CONNECTIONS_TOTAL};
use crate::registry::SessionRegistry;
use crate::server::AppState;
use crate::session::{Frame, Session, SessionOptions, TransportError, run_session};
use crate::shutdown::ShutdownCoordinator;

/// How long teardown waits for the writer to flush and send its close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Accept a WebSocket upgrade, unless shutting down or at the connection limit.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }
    let open = state.registry.len().await;
    let limit = state.config.max_connections;
    if open >= limit {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(open, limit, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(|err| warn!(error = %err, "websocket handshake failed"))
        .on_upgrade(move |socket| run_connection(socket, state))
}

/// Own one upgraded socket from registration to teardown.
async fn run_connection(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    let id = state.registry.next_id();
    let (session, rx) = Session::with_channel(id, state.config.outbound_buffer);
    let session = Arc::new(session);
    let _ = session.open();

    if !admit(&state.registry, &state.shutdown, &session).await {
        return;
    }
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(session_id = %id, "client connected");

    let mut writer = tokio::spawn(run_writer(
        sink,
        rx,
        session.clone(),
        Heartbeat::from(&*state.config),
    ));
    let inbound = stream.map(|msg| msg.map(Frame::from).map_err(TransportError::new));
    let _ = run_session(
        session,
        inbound,
        &state.table,
        &state.ctx,
        SessionOptions::from(&*state.config),
    )
    .await;

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        debug!(session_id = %id, "writer still draining after {WRITER_DRAIN_TIMEOUT:?}, aborting");
        writer.abort();
    }
}

/// Register `session`, or close it if shutdown has already begun.
///
/// Shutdown cancels its token before sweeping the registry, so checking the
/// token after registering catches sessions that land after the sweep.
async fn admit(
    registry: &SessionRegistry,
    shutdown: &ShutdownCoordinator,
    session: &Arc<Session>,
) -> bool {
    if let Err(e) = registry.register(session.clone()).await {
        error!(session_id = %session.id(), error = %e, "failed to register session");
        let _ = session.close();
        return false;
    }
    if shutdown.is_shutting_down() {
        debug!(session_id = %session.id(), "shutdown began during upgrade, closing");
        let _ = session.close();
        let _ = registry.unregister(session.id()).await;
        session.mark_closed();
        return false;
    }
    true
}
