//! Configuration loading and resolution
//!
//! Every setting resolves with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error; defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_CONFIG_FILE: &str = "SONGBOOK_CONFIG";
pub const ENV_API_URL: &str = "SONGBOOK_API_URL";
pub const ENV_STORAGE_DIR: &str = "SONGBOOK_STORAGE_DIR";
pub const ENV_DATABASE_URL: &str = "SONGBOOK_DATABASE_URL";
pub const ENV_UPLOADS_DIR: &str = "SONGBOOK_UPLOADS_DIR";
pub const ENV_BIND: &str = "SONGBOOK_BIND";

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of `config.toml`; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the songs API (including the `/api` prefix)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bounded wait for each API request
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Directory backing the client's local key-value storage
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerToml,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[server]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerToml {
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Resolved client settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub storage_dir: PathBuf,
}

impl ClientConfig {
    /// Resolve client settings from CLI overrides, environment and TOML
    pub fn resolve(
        toml: &TomlConfig,
        cli_api_url: Option<&str>,
        cli_storage_dir: Option<&Path>,
    ) -> Self {
        let api_url = cli_api_url
            .map(str::to_string)
            .or_else(|| std::env::var(ENV_API_URL).ok())
            .or_else(|| toml.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let storage_dir = cli_storage_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_STORAGE_DIR).ok().map(PathBuf::from))
            .or_else(|| toml.storage_dir.clone())
            .unwrap_or_else(|| default_data_dir().join("storage"));

        let request_timeout = Duration::from_secs(request_timeout_secs(toml));

        Self {
            api_url,
            request_timeout,
            storage_dir,
        }
    }
}

/// Configured request timeout in whole seconds, at least one
fn request_timeout_secs(toml: &TomlConfig) -> u64 {
    match toml.request_timeout_secs {
        Some(0) => {
            warn!(
                "request_timeout_secs = 0 would fail every request, using {}s",
                MIN_REQUEST_TIMEOUT_SECS
            );
            MIN_REQUEST_TIMEOUT_SECS
        }
        Some(secs) => secs,
        None => DEFAULT_REQUEST_TIMEOUT_SECS,
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::resolve(&TomlConfig::default(), None, None)
    }
}

/// Resolved server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub database_url: String,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Resolve server settings from CLI overrides, environment and TOML
    pub fn resolve(toml: &TomlConfig, cli_bind: Option<&str>) -> Self {
        let data_dir = default_data_dir();

        let bind = cli_bind
            .map(str::to_string)
            .or_else(|| std::env::var(ENV_BIND).ok())
            .or_else(|| toml.server.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let database_url = std::env::var(ENV_DATABASE_URL)
            .ok()
            .or_else(|| toml.server.database_url.clone())
            .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("songbook.db").display()));

        let uploads_dir = std::env::var(ENV_UPLOADS_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| toml.server.uploads_dir.clone())
            .unwrap_or_else(|| data_dir.join("uploads"));

        let max_upload_bytes = toml
            .server
            .max_upload_bytes
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            bind,
            database_url,
            uploads_dir,
            max_upload_bytes,
        }
    }
}

/// Load the TOML config file
///
/// An explicitly requested file (argument or `SONGBOOK_CONFIG`) must exist.
/// The platform default location is optional: when absent, defaults are used.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(ENV_CONFIG_FILE).ok().map(PathBuf::from));

    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("No config file found, using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let config = read_toml_config(&path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Platform config file location (`<config_dir>/songbook/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("songbook").join("config.toml"))
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("songbook"))
        .unwrap_or_else(|| PathBuf::from("./songbook_data"))
}
