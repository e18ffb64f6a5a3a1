//! Server and logging settings.

use huddle_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Network, connection and session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrently open sessions; further upgrades are refused.
    pub max_connections: usize,
    /// Seconds between server-initiated pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a peer is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
    /// Per-session outbound queue depth.
    pub outbound_buffer: usize,
    /// Close a session that sends a frame that is not a valid envelope.
    pub close_on_malformed: bool,
    /// Seconds to wait for in-flight work during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 1024 * 1024,
            outbound_buffer: 256,
            close_on_malformed: true,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerSettings {
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "heartbeatTimeoutSecs must not be shorter than heartbeatIntervalSecs".into(),
            ));
        }
        if self.outbound_buffer == 0 {
            return Err(SettingsError::InvalidValue("outboundBuffer must be at least 1".into()));
        }
        if self.max_connections == 0 {
            return Err(SettingsError::InvalidValue("maxConnections must be at least 1".into()));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
