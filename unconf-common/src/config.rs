//! Configuration loading and root folder resolution

use crate::catalog::Catalog;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "UNCONF_ROOT_FOLDER";

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:5780";

/// Default log filter when RUST_LOG is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Marker left in unedited remote configuration templates
const PLACEHOLDER_MARKER: &str = "YOUR_PROJECT_ID";

/// Remote store settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the realtime database, e.g. `https://demo.firebaseio.com`
    pub database_url: Option<String>,
    /// Optional auth token appended to every request
    pub auth: Option<String>,
}

impl RemoteConfig {
    /// Database URL if set and not the template placeholder
    pub fn configured_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| is_usable_url(url))
    }
}

/// One `[[sessions]]` entry overriding the built-in catalog
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub id: String,
    pub name: String,
}

/// TOML configuration file contents
///
/// Every field is optional; a missing file behaves like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
    pub bind: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Session catalog: the configured override, or the built-in one
    pub fn catalog(&self) -> Result<Catalog> {
        if self.sessions.is_empty() {
            return Ok(Catalog::unconference());
        }
        Catalog::from_pairs(self.sessions.iter().map(|s| (s.id.clone(), s.name.clone())))
    }

    pub fn bind_address(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// Where the loaded configuration came from
///
/// Loading happens before logging is set up, so the caller reports this
/// with [`ConfigSource::log`] once a subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// Nothing at the default path; defaults in use
    Missing(PathBuf),
    /// No platform config directory; defaults in use
    NoConfigDir,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config file {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("No config file at {}, using defaults", path.display())
            }
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }
}

/// Load the TOML config
///
/// `explicit` comes from the command line and must exist. Without it the
/// platform config path is tried; a missing file there yields defaults
/// rather than an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    load_toml_config_at(explicit, default_config_path())
}

/// [`load_toml_config`] with the default path supplied by the caller
pub fn load_toml_config_at(
    explicit: Option<&Path>,
    default_path: Option<PathBuf>,
) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config = TomlConfig::from_toml_str(&content)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    match default_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config = TomlConfig::from_toml_str(&content)?;
            Ok((config, ConfigSource::File(path)))
        }
        Some(path) => Ok((TomlConfig::default(), ConfigSource::Missing(path))),
        None => Ok((TomlConfig::default(), ConfigSource::NoConfigDir)),
    }
}

/// Remote database URL in effect
///
/// The command line (or its env var) wins over the config file. Blank
/// values and unedited template URLs count as not configured, and a
/// command-line value of that kind falls back to the config file.
pub fn configured_remote_url<'a>(cli: Option<&'a str>, config: &'a TomlConfig) -> Option<&'a str> {
    cli.map(str::trim)
        .filter(|url| is_usable_url(url))
        .or_else(|| config.remote.configured_url())
}

fn is_usable_url(url: &str) -> bool {
    !url.is_empty() && !url.contains(PLACEHOLDER_MARKER)
}

/// Platform config file path (`<config_dir>/unconf/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("unconf").join("config.toml"))
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("unconf"))
        .unwrap_or_else(|| PathBuf::from("./unconf_data"))
}
