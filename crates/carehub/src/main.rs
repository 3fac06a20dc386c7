//! # carehub
//!
//! Care-call hub binary: loads settings, starts logging and metrics, and
//! serves the HTTP/WebSocket hub until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use carehub_server::config::ServerConfig;
use carehub_server::server::CareHubServer;
use carehub_settings::HubSettings;
use clap::Parser;

/// Care-call real-time hub.
#[derive(Parser, Debug)]
#[command(name = "carehub", about = "Care-call real-time hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.carehub/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

/// Apply command-line overrides on top of loaded settings.
fn resolve_config(cli: &Cli, settings: &HubSettings) -> ServerConfig {
    let mut config = ServerConfig::from_settings(&settings.server);
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(carehub_settings::settings_path);
    let settings = carehub_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    carehub_core::logging::init_subscriber(
        settings.logging.level.as_filter_str(),
        args.json_logs || settings.logging.json,
    );

    let config = resolve_config(&args, &settings);
    let shutdown_timeout = config.shutdown_timeout();

    let mut server = CareHubServer::new(config);
    match carehub_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(version = %settings.version, "carehub listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!(connections = server.registry().count(), "Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], shutdown_timeout)
        .await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["carehub"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.settings.is_none());
        assert!(!cli.json_logs);

        let config = resolve_config(&cli, &HubSettings::default());
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn cli_overrides_host_and_port() {
        let cli = Cli::parse_from(["carehub", "--host", "127.0.0.1", "--port", "9100"]);
        let config = resolve_config(&cli, &HubSettings::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:9100");
    }

    #[test]
    fn cli_settings_path_and_json_logs() {
        let cli = Cli::parse_from(["carehub", "--settings", "/etc/carehub.json", "--json-logs"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/carehub.json")));
        assert!(cli.json_logs);
    }

    #[test]
    fn settings_file_feeds_server_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 8123, "outboundQueueCapacity": 0}}"#,
        )
        .unwrap();
        let settings = carehub_settings::load_settings_from_path(&path).unwrap();
        let cli = Cli::parse_from(["carehub"]);
        let config = resolve_config(&cli, &settings);
        // CAREHUB_PORT in the environment would override the file.
        if std::env::var_os("CAREHUB_PORT").is_none() {
            assert_eq!(config.port, 8123);
        }
        assert!(config.outbound_queue_capacity >= 1);
    }

    #[tokio::test]
    async fn server_health_and_shutdown() {
        let cli = Cli::parse_from(["carehub", "--host", "127.0.0.1", "--port", "0"]);
        let config = resolve_config(&cli, &HubSettings::default());
        let timeout = config.shutdown_timeout();
        let server = CareHubServer::new(config);
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.shutdown().graceful_shutdown(vec![handle], timeout).await;
        assert!(server.shutdown().is_shutting_down());
    }
}
