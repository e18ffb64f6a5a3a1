//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder globally.
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before anything is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Upgrades accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Sessions torn down (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Registered sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Messages dropped on a full outbound queue (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Sessions evicted after a failed send (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Session lifetime (histogram).
pub const SESSION_DURATION_SECONDS: &str = "session_duration_seconds";
/// Dispatched inbound envelopes (counter, labels: type).
pub const MESSAGES_RECEIVED_TOTAL: &str = "messages_received_total";
/// Frames that failed envelope decoding (counter).
pub const INBOUND_MALFORMED_TOTAL: &str = "inbound_malformed_total";
/// Dispatch failures (counter, labels: type, error_type).
pub const DISPATCH_ERRORS_TOTAL: &str = "dispatch_errors_total";
/// Handler run time (histogram, labels: type).
pub const DISPATCH_DURATION_SECONDS: &str = "dispatch_duration_seconds";
/// Envelopes enqueued for delivery (counter, labels: type).
pub const MESSAGES_SENT_TOTAL: &str = "messages_sent_total";
