//! Configuration system for the Agile Party client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/agileparty/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use agileparty_proto::room::{RoomId, UserId};

use crate::net::NetConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    reconnect: ReconnectFileConfig,
    sync: SyncFileConfig,
    session: SessionFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    ws_url: Option<String>,
    api_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// `[reconnect]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReconnectFileConfig {
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    max_jitter_ms: Option<u64>,
    max_attempts: Option<u32>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    active_task_retry_ms: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    room_id: Option<String>,
    nickname: Option<String>,
    user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Reconnection backoff policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry; doubled for every further attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay, jitter included.
    pub max_delay: Duration,
    /// Largest random jitter added to a delay.
    pub max_jitter: Duration,
    /// Attempts before the session gives up and stays disconnected.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            max_attempts: 10,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Server --
    /// Base URL of the event-stream server (`ws://` or `wss://`).
    pub ws_url: String,
    /// Base URL of the request/response API.
    pub api_url: String,
    /// Timeout for opening the event stream.
    pub connect_timeout: Duration,
    /// Timeout for a single API request.
    pub request_timeout: Duration,

    // -- Reconnect --
    /// Backoff policy for abnormal closes.
    pub reconnect: ReconnectConfig,

    // -- Sync --
    /// Delay before the single re-lookup of a not-yet-known active task.
    pub active_task_retry: Duration,
    /// Channel capacity for command/event mpsc channels.
    pub channel_capacity: usize,

    // -- Session --
    /// Room to join.
    pub room_id: Option<String>,
    /// Display name in the room.
    pub nickname: Option<String>,
    /// Stable user identity; minted when absent.
    pub user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080".to_string(),
            api_url: "http://localhost:8080".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            active_task_retry: Duration::from_millis(150),
            channel_capacity: 256,
            room_id: None,
            nickname: None,
            user_id: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/agileparty/config.toml`) is
    /// tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// CLI args and env vars over compiled defaults, with no config file.
    ///
    /// The fallback when [`Self::load`] fails.
    #[must_use]
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self::resolve(cli, &ConfigFile::default())
    }

    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            ws_url: cli
                .ws_url
                .clone()
                .or_else(|| file.server.ws_url.clone())
                .unwrap_or(defaults.ws_url),
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.server.api_url.clone())
                .unwrap_or(defaults.api_url),
            connect_timeout: file
                .server
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            request_timeout: file
                .server
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            reconnect: ReconnectConfig {
                base_delay: file
                    .reconnect
                    .base_delay_ms
                    .map_or(defaults.reconnect.base_delay, Duration::from_millis),
                max_delay: file
                    .reconnect
                    .max_delay_ms
                    .map_or(defaults.reconnect.max_delay, Duration::from_millis),
                max_jitter: file
                    .reconnect
                    .max_jitter_ms
                    .map_or(defaults.reconnect.max_jitter, Duration::from_millis),
                max_attempts: file
                    .reconnect
                    .max_attempts
                    .unwrap_or(defaults.reconnect.max_attempts),
            },
            active_task_retry: file
                .sync
                .active_task_retry_ms
                .map_or(defaults.active_task_retry, Duration::from_millis),
            channel_capacity: file
                .sync
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            room_id: cli.room.clone().or_else(|| file.session.room_id.clone()),
            nickname: cli
                .nickname
                .clone()
                .or_else(|| file.session.nickname.clone()),
            user_id: cli
                .user_id
                .clone()
                .or_else(|| file.session.user_id.clone()),
        }
    }

    /// Build a [`NetConfig`] for `room` as `user_id` / `nickname`.
    #[must_use]
    pub fn net_config_for(&self, room_id: RoomId, user_id: UserId, nickname: &str) -> NetConfig {
        NetConfig {
            ws_url: self.ws_url.clone(),
            room_id,
            user_id,
            nickname: nickname.to_string(),
            connect_timeout: self.connect_timeout,
            reconnect: self.reconnect.clone(),
            active_task_retry: self.active_task_retry,
            channel_capacity: self.channel_capacity,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Realtime planning-poker room client")]
pub struct CliArgs {
    /// Base URL of the event-stream server.
    #[arg(long, env = "AGILEPARTY_WS_URL")]
    pub ws_url: Option<String>,

    /// Base URL of the request/response API.
    #[arg(long, env = "AGILEPARTY_API_URL")]
    pub api_url: Option<String>,

    /// Room to join.
    #[arg(long, env = "AGILEPARTY_ROOM")]
    pub room: Option<String>,

    /// Create a new room with this name instead of joining one.
    #[arg(long, conflicts_with = "room")]
    pub create: Option<String>,

    /// Display name in the room.
    #[arg(long, env = "AGILEPARTY_NICKNAME")]
    pub nickname: Option<String>,

    /// Stable user identity (a fresh one is generated when omitted).
    #[arg(long, env = "AGILEPARTY_USER_ID")]
    pub user_id: Option<String>,

    /// Path to config file (default: `~/.config/agileparty/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "AGILEPARTY_LOG")]
    pub log_level: String,

    /// Path to log file (default: stderr).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("agileparty").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
