//! # huddle-relay
//!
//! Chat relay binary: loads settings, wires the room store and handlers into
//! the server, and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_core::logging::{LogFormat, init_subscriber};
use huddle_server::dispatch::DispatchTable;
use huddle_server::handlers::register_all;
use huddle_server::{RelayServer, ServerConfig};
use huddle_settings::{HuddleSettings, load_settings_from_path, settings_path};
use huddle_store::InMemoryRoomStore;
use tracing::{info, warn};

/// Huddle chat relay.
#[derive(Parser, Debug)]
#[command(name = "huddle-relay", about = "Real-time chat relay over WebSocket")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.huddle/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: `compact` or `json` (overrides settings).
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Maximum concurrently open sessions (overrides settings).
    #[arg(long)]
    max_connections: Option<usize>,

    /// Rooms to create at startup.
    #[arg(long = "room")]
    rooms: Vec<String>,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format '{value}'"))
}

impl Cli {
    /// Apply command-line overrides, the highest-priority layer.
    fn apply(&self, settings: &mut HuddleSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(max) = self.max_connections {
            settings.server.max_connections = max;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }

    /// Load the settings file, apply command-line overrides, then validate
    /// the result as a whole.
    fn resolve_settings(&self) -> Result<HuddleSettings> {
        let path = self.config.clone().unwrap_or_else(settings_path);
        let mut settings = load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

fn build_server(settings: &HuddleSettings, rooms: &[String]) -> Result<RelayServer> {
    let mut table = DispatchTable::new();
    register_all(&mut table).context("Failed to register message handlers")?;
    let store = Arc::new(InMemoryRoomStore::with_rooms(rooms));
    Ok(RelayServer::new(
        ServerConfig::from(&settings.server),
        table,
        store,
    ))
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = args.resolve_settings()?;

    init_subscriber(&settings.logging.level, settings.logging.format);

    let mut server = build_server(&settings, &args.rooms)?;
    match huddle_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => warn!(error = %e, "metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!(
        "Huddle relay listening on ws://{addr}/ws ({} handlers registered)",
        server.table().len()
    );

    shutdown_signal().await?;

    info!("Shutting down...");
    server.stop(handle).await;
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["huddle-relay"]);
        let mut settings = HuddleSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.logging.level, "info");
        assert!(cli.rooms.is_empty());
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "huddle-relay",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--max-connections",
            "5",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ]);
        let mut settings = HuddleSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.max_connections, 5);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["huddle-relay", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn cli_config_and_rooms() {
        let cli = Cli::parse_from([
            "huddle-relay",
            "--config",
            "/tmp/huddle.json",
            "--room",
            "general",
            "--room",
            "random",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/huddle.json")));
        assert_eq!(cli.rooms, ["general", "random"]);
    }

    #[test]
    fn cli_layer_beats_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9100}}"#).unwrap();
        let mut settings = load_settings_from_path(&path).unwrap();
        Cli::parse_from(["huddle-relay", "--port", "9200"]).apply(&mut settings);
        assert_eq!(settings.server.port, 9200);
    }

    #[test]
    fn cli_overrides_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("missing.json");
        let config = config.to_str().unwrap();

        let cli = Cli::parse_from(["huddle-relay", "--config", config, "--max-connections", "0"]);
        let err = cli.resolve_settings().unwrap_err();
        assert!(format!("{err:#}").contains("maxConnections"));

        let cli = Cli::parse_from(["huddle-relay", "--config", config, "--max-connections", "3"]);
        assert_eq!(cli.resolve_settings().unwrap().server.max_connections, 3);
    }

    #[test]
    fn server_has_every_handler_and_seeded_rooms() {
        let server = build_server(&HuddleSettings::default(), &["general".to_string()]).unwrap();
        assert_eq!(server.table().tags(), ["InitSession", "PostMessage", "PostNewRoom"]);
    }

    #[tokio::test]
    async fn seeded_rooms_are_in_the_store() {
        let server = build_server(&HuddleSettings::default(), &["general".to_string()]).unwrap();
        assert_eq!(server.store().room_names().await, ["general"]);
    }

    #[tokio::test]
    async fn server_graceful_shutdown() {
        let mut settings = HuddleSettings::default();
        settings.server.port = 0;
        let server = build_server(&settings, &[]).unwrap();
        let (_, handle) = server.listen().await.unwrap();

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }
}
