//! # lectern
//!
//! Lectern server binary: loads settings, wires the element catalog,
//! session registry, and HTTP/WebSocket server, then runs until Ctrl-C or
//! SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lectern_logging::LogFormat;
use lectern_server::{
    CredentialTable, LecternServer, ServerConfig, SessionRegistry, shutdown_signal,
};
use lectern_settings::{DEFAULT_CONFIG_PATH, LecternSettings};

/// How long shutdown waits for the listener and reaper.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lectern live-interaction server.
#[derive(Parser, Debug)]
#[command(name = "lectern", version, about = "Lectern live-interaction server")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut LecternSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

/// Build the server from settings without binding.
fn build_server(settings: &LecternSettings) -> Result<LecternServer> {
    let catalog = lectern_elements::default_catalog().context("Failed to build element catalog")?;
    let config = ServerConfig::from(settings);
    let mut registry = SessionRegistry::new(Arc::new(catalog), config.hub.clone());
    if settings.auth.require_auth_for_new {
        if settings.auth.credentials.is_empty() {
            tracing::warn!("requireAuthForNew is set but no credentials are configured");
        }
        let table = CredentialTable::new(settings.auth.credentials.clone());
        registry = registry.with_authenticator(Arc::new(table));
    }
    Ok(LecternServer::new(config, Arc::new(registry)))
}

fn log_format(settings: &LecternSettings) -> LogFormat {
    if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = lectern_settings::load_settings_from_path(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    args.apply(&mut settings);

    lectern_logging::init_subscriber(&settings.logging.level, log_format(&settings));

    let server = build_server(&settings)?;
    let handle = server.listen().await.context("Failed to bind server")?;

    tracing::info!(
        "Lectern listening on http://{}{} ({} elements)",
        handle.addr,
        server.config().server_path,
        server.registry().catalog().len()
    );

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    server.stop(handle, Some(SHUTDOWN_TIMEOUT)).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["lectern"]);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.host, None);
        assert_eq!(cli.port, None);
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from(["lectern", "--host", "127.0.0.1", "--port", "9000"]);
        let mut settings = LecternSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn cli_without_overrides_keeps_settings() {
        let cli = Cli::parse_from(["lectern", "-c", "/etc/lectern.json"]);
        let mut settings = LecternSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(cli.config, PathBuf::from("/etc/lectern.json"));
    }

    #[test]
    fn config_file_feeds_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"server": {"serverPath": "live/", "port": 0}, "sessions": {"tickIntervalMs": 500}}"#,
        )
        .unwrap();
        let settings = lectern_settings::load_with(&path, |_| None).unwrap();

        let server = build_server(&settings).unwrap();
        assert_eq!(server.config().server_path, "/live");
        assert_eq!(server.config().hub.tick_interval, Duration::from_millis(500));
        assert!(!server.registry().requires_credentials());
        assert_eq!(server.registry().catalog().len(), 4);
    }

    #[test]
    fn require_auth_installs_authenticator() {
        let mut settings = LecternSettings::default();
        settings.auth.require_auth_for_new = true;
        settings.auth.credentials = BTreeMap::from([("alice".to_string(), "pw".to_string())]);
        let server = build_server(&settings).unwrap();
        assert!(server.registry().requires_credentials());
    }

    #[test]
    fn log_format_follows_settings() {
        let mut settings = LecternSettings::default();
        assert_eq!(log_format(&settings), LogFormat::Compact);
        settings.logging.json = true;
        assert_eq!(log_format(&settings), LogFormat::Json);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(lectern_settings::load_with(&path, |_| None).is_err());
    }
}
