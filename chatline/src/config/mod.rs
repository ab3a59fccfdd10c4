//! Configuration system for the chatline client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/chatline/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::format::DEFAULT_DISPLAY_WIDTH;
use crate::session::{DEFAULT_DISCONNECT_TIMEOUT, SessionSettings};
use crate::transport::tcp::{DEFAULT_HOST, TcpConnector};

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

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    chat: ChatFileConfig,
    ui: UiFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout_secs: Option<u64>,
    disconnect_timeout_secs: Option<u64>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    display_width: Option<usize>,
    max_name_attempts: Option<u32>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Chat server host name or address.
    pub host: String,
    /// Port to connect to at startup; `None` waits for `/connect`.
    pub port: Option<u16>,
    /// Upper bound on opening a connection.
    pub connect_timeout: Duration,
    /// Upper bound on writing the leave notice.
    pub disconnect_timeout: Duration,
    /// Incoming text longer than this many characters is reflowed.
    pub display_width: usize,
    /// Cap on name submissions per handshake.
    pub max_name_attempts: Option<u32>,
    /// Timestamp prefix format for console lines (chrono). Empty disables it.
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            display_width: DEFAULT_DISPLAY_WIDTH,
            max_name_attempts: None,
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// or if any config file that exists cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref(), default_config_path())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            host: cli
                .host
                .clone()
                .or_else(|| file.network.host.clone())
                .unwrap_or(defaults.host),
            port: cli.port.or(file.network.port),
            connect_timeout: file
                .network
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            disconnect_timeout: file
                .network
                .disconnect_timeout_secs
                .map_or(defaults.disconnect_timeout, Duration::from_secs),
            display_width: cli
                .display_width
                .or(file.chat.display_width)
                .unwrap_or(defaults.display_width),
            max_name_attempts: file.chat.max_name_attempts,
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
        }
    }

    /// Session tunables from this configuration.
    #[must_use]
    pub const fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            display_width: self.display_width,
            max_name_attempts: self.max_name_attempts,
            disconnect_timeout: self.disconnect_timeout,
        }
    }

    /// A TCP connector for the configured host.
    #[must_use]
    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(self.host.clone()).with_connect_timeout(self.connect_timeout)
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Line-oriented terminal chat client")]
pub struct CliArgs {
    /// Chat server host.
    #[arg(long, env = "CHATLINE_HOST")]
    pub host: Option<String>,

    /// Connect to this port at startup.
    #[arg(short, long, env = "CHATLINE_PORT")]
    pub port: Option<u16>,

    /// Path to config file (default: `~/.config/chatline/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reflow incoming messages longer than this many characters.
    #[arg(long)]
    pub display_width: Option<usize>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHATLINE_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/chatline.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// `~/.config/chatline/config.toml`, or the platform equivalent.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatline").join("config.toml"))
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// Otherwise `default_path` is tried and a missing file is treated as empty
/// config.
fn load_config_file(
    explicit_path: Option<&Path>,
    default_path: Option<PathBuf>,
) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(path) = default_path else {
        return Ok(ConfigFile::default());
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
