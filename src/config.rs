//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **CLI flags** — `--url`, `--host`, `--port`, `--yes`, `--graceful`
//! 2. **Environment variables** — `SIMWATCH_HOST`, `SIMWATCH_PORT`
//! 3. **Config file** — path via `--config <path>`, or `simwatch.toml` in CWD
//! 4. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [manager]
//! host = "127.0.0.1"
//! port = 8080
//! path = "/ws"
//!
//! [display]
//! log_window = 20
//! show_runs = true
//!
//! [shutdown]
//! confirm = true
//! graceful = true   # omit to send a bare SHUTDOWN
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "simwatch.toml";

/// Live-status client for the simulation-run manager.
#[derive(Debug, Default, Parser)]
#[command(name = "simwatch", version)]
pub struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Full WebSocket URL of the manager (overrides host/port/path).
    #[arg(long)]
    pub url: Option<String>,
    /// Manager host.
    #[arg(long)]
    pub host: Option<String>,
    /// Manager port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Send shutdown requests without asking for confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,
    /// Value for the `graceful` field of shutdown requests.
    #[arg(long)]
    pub graceful: Option<bool>,
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Set from `--url`; not read from the file.
    #[serde(skip)]
    pub url_override: Option<String>,
}

/// Where the manager's UI channel lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Host of the manager's web UI (default `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the manager's web UI (default 8080).
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket path (default `/ws`).
    #[serde(default = "default_path")]
    pub path: String,
}

/// Terminal output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Log lines shown by `status` (default 20, 0 = all).
    #[serde(default = "default_log_window")]
    pub log_window: usize,
    /// Include one line per run in `status` output (default true).
    #[serde(default = "default_show_runs")]
    pub show_runs: bool,
}

/// Shutdown request behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Ask for confirmation before sending (default true).
    #[serde(default = "default_confirm")]
    pub confirm: bool,
    /// `graceful` field sent with the request; omitted when unset.
    #[serde(default)]
    pub graceful: Option<bool>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_path() -> String {
    "/ws".to_string()
}
fn default_log_window() -> usize {
    20
}
fn default_show_runs() -> bool {
    true
}
fn default_confirm() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            log_window: default_log_window(),
            show_runs: default_show_runs(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            confirm: default_confirm(),
            graceful: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: CLI > env vars > file > defaults.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.apply_cli(cli);
        config.endpoint()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = var("SIMWATCH_HOST") {
            self.manager.host = host;
        }
        if let Some(port) = var("SIMWATCH_PORT") {
            self.manager.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "SIMWATCH_PORT",
                value: port,
            })?;
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.manager.host.clone_from(host);
        }
        if let Some(port) = cli.port {
            self.manager.port = port;
        }
        if let Some(url) = &cli.url {
            self.url_override = Some(url.clone());
        }
        if cli.yes {
            self.shutdown.confirm = false;
        }
        if cli.graceful.is_some() {
            self.shutdown.graceful = cli.graceful;
        }
    }

    /// The manager's WebSocket URL.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url_override {
            if url.starts_with("ws://") || url.starts_with("wss://") {
                return Ok(url.clone());
            }
            return Err(ConfigError::InvalidEndpoint(format!(
                "{url} (expected ws:// or wss://)"
            )));
        }
        let host = self.manager.host.trim();
        if host.is_empty() {
            return Err(ConfigError::InvalidEndpoint("empty host".into()));
        }
        let path = self.manager.path.trim_start_matches('/');
        Ok(format!("ws://{host}:{}/{path}", self.manager.port))
    }
}
