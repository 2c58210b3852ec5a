//! TOML-based configuration persistence.
//!
//! The default file location is platform-specific:
//! - Windows:  `%APPDATA%\ScanWedge\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/scanwedge/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/ScanWedge/config.toml`
//!
//! Every field has a serde default, so a missing file, an empty file, or a
//! file from an older version all load cleanly:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! log_level = "info"
//!
//! [scanner]
//! enable_hook = true
//! timeout_ms = 100
//! min_length = 3
//! max_length = 50
//!
//! [websocket]
//! queue_capacity = 256
//! broadcast_capacity = 256
//! ping_period_secs = 54
//! pong_wait_secs = 60
//! write_wait_secs = 10
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scanwedge_core::AssemblerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ConfigValidationError, HubSettings, ServiceConfig, SessionSettings};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigValidationError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub scanner: ScannerSection,
    #[serde(default)]
    pub websocket: WebSocketSection,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Keystroke assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerSection {
    /// Install the OS keyboard hook (Windows only).
    #[serde(default = "default_true")]
    pub enable_hook: bool,
    /// Maximum gap between keys of one scan, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

/// Fan-out and liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSocketSection {
    /// Frames buffered per subscriber.
    #[serde(default = "default_capacity")]
    pub queue_capacity: usize,
    /// Commands buffered ahead of the hub control loop.
    #[serde(default = "default_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_ping_period_secs")]
    pub ping_period_secs: u64,
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    100
}
fn default_min_length() -> usize {
    3
}
fn default_max_length() -> usize {
    50
}
fn default_capacity() -> usize {
    256
}
fn default_ping_period_secs() -> u64 {
    54
}
fn default_pong_wait_secs() -> u64 {
    60
}
fn default_write_wait_secs() -> u64 {
    10
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            enable_hook: default_true(),
            timeout_ms: default_timeout_ms(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl Default for WebSocketSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_capacity(),
            broadcast_capacity: default_capacity(),
            ping_period_secs: default_ping_period_secs(),
            pong_wait_secs: default_pong_wait_secs(),
            write_wait_secs: default_write_wait_secs(),
        }
    }
}

impl AppConfig {
    /// Converts the file schema into validated runtime settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::BindAddress`] if `bind_address` is not an IP address,
    /// [`ConfigError::Invalid`] if a cross-field constraint is violated.
    pub fn to_service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.server.bind_address.clone()))?;

        let config = ServiceConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            log_level: self.server.log_level.clone(),
            enable_hook: self.scanner.enable_hook,
            assembler: AssemblerConfig {
                char_timeout_ms: self.scanner.timeout_ms,
                min_length: self.scanner.min_length,
                max_length: self.scanner.max_length,
            },
            hub: HubSettings {
                queue_capacity: self.websocket.queue_capacity,
                inbound_capacity: self.websocket.broadcast_capacity,
            },
            session: SessionSettings {
                ping_period: Duration::from_secs(self.websocket.ping_period_secs),
                pong_wait: Duration::from_secs(self.websocket.pong_wait_secs),
                write_wait: Duration::from_secs(self.websocket.write_wait_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ScanWedge"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("scanwedge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ScanWedge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
