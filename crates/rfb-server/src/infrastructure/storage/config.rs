//! TOML-based configuration for the RFB server.
//!
//! The config file is looked up in this order:
//! 1. The path in the `RFB_SERVER_CONFIG` environment variable.
//! 2. The platform config directory:
//!    - Windows:  `%APPDATA%\RfbServer\config.toml`
//!    - Linux:    `$XDG_CONFIG_HOME/rfb-server/config.toml` (or `~/.config/...`)
//!    - macOS:    `~/Library/Application Support/RfbServer/config.toml`
//!
//! A missing file is not an error: every field has a default, so the server
//! runs out of the box.  Example:
//!
//! ```toml
//! [server]
//! port = 5901
//! bind_address = "0.0.0.0"
//! desktop_name = "Antares"
//! log_level = "info"
//!
//! [session]
//! update_policy = "per_poll"    # or "until_repaint"
//! max_cut_text_len = 1048576
//!
//! [display]
//! width = 640
//! height = 480
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, and whole sections are
//! `#[serde(default)]`, so a partial file only overrides what it names.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::bootstrap::{ServerIdentity, DEFAULT_DESKTOP_NAME};
use crate::infrastructure::network::engine::{
    EngineOptions, UpdatePolicy, DEFAULT_MAX_CUT_TEXT_LEN,
};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "RFB_SERVER_CONFIG";

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

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    /// The framebuffer would be empty.
    #[error("display size {width}x{height} must be non-zero")]
    EmptyDisplay { width: u16, height: u16 },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Listening socket and process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// TCP port to listen on.  VNC display `:1` is 5901.
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Desktop name shown by the viewer.
    #[serde(default = "default_desktop_name")]
    pub desktop_name: String,
    /// `tracing` log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Per-session protocol behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// When a repeated FramebufferUpdateRequest gets a full frame again.
    #[serde(default)]
    pub update_policy: UpdatePolicy,
    /// Largest ClientCutText a viewer may announce, in bytes.
    #[serde(default = "default_max_cut_text_len")]
    pub max_cut_text_len: usize,
}

/// Framebuffer dimensions announced in ServerInit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_height")]
    pub height: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    5901
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_desktop_name() -> String {
    DEFAULT_DESKTOP_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_cut_text_len() -> usize {
    DEFAULT_MAX_CUT_TEXT_LEN
}
fn default_width() -> u16 {
    640
}
fn default_height() -> u16 {
    480
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            desktop_name: default_desktop_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_policy: UpdatePolicy::default(),
            max_cut_text_len: default_max_cut_text_len(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl AppConfig {
    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` does not
    /// parse as an IPv4 or IPv6 address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// What ServerInit announces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyDisplay`] for a zero width or height.
    pub fn identity(&self) -> Result<ServerIdentity, ConfigError> {
        let DisplayConfig { width, height } = self.display;
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyDisplay { width, height });
        }
        Ok(ServerIdentity::new(
            width,
            height,
            self.server.desktop_name.clone(),
        ))
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            update_policy: self.session.update_policy,
            max_cut_text_len: self.session.max_cut_text_len,
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Resolves the config file path: `$RFB_SERVER_CONFIG`, else the platform
/// config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if neither is available.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory including the `RfbServer` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RfbServer"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rfb-server"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RfbServer")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
