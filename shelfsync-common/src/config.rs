//! Configuration loading and root folder resolution
//!
//! Missing or unreadable configuration never stops a module from starting:
//! every loader falls back to compiled defaults and logs a warning.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SHELFSYNC_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "SHELFSYNC_CONFIG";

/// SQLite file name inside the root folder
pub const DATABASE_FILE: &str = "shelfsync.db";

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file path (stdout when absent)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` from the TOML config
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_root_folder: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_root_folder {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Resolve the TOML config path: CLI > environment > per-user config dir
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|dir| dir.join("shelfsync").join("config.toml"))
}

/// Prepares the root folder that holds the database
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("shelfsync"))
        .unwrap_or_else(|| PathBuf::from("./shelfsync_data"))
}

/// Where a loaded config came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at the location (or no location at all); defaults used
    Missing(Option<PathBuf>),
    /// File present but unreadable or malformed; defaults used
    Invalid { path: PathBuf, error: String },
}

impl ConfigSource {
    /// Report the outcome; call once logging is up
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!(path = %path.display(), "Loaded config file"),
            ConfigSource::Missing(Some(path)) => {
                info!(path = %path.display(), "Config file not found, using defaults")
            }
            ConfigSource::Missing(None) => info!("No config file location available, using defaults"),
            ConfigSource::Invalid { path, error } => {
                warn!(path = %path.display(), error = %error, "Ignoring unreadable config file, using defaults")
            }
        }
    }
}

/// Load a TOML config file into `T`, falling back to `T::default()`
///
/// Never fails. The returned [`ConfigSource`] says what happened, since this
/// usually runs before the subscriber that would show a log line exists.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> (T, ConfigSource)
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return (T::default(), ConfigSource::Missing(None));
    };

    if !path.exists() {
        return (T::default(), ConfigSource::Missing(Some(path.to_path_buf())));
    }

    match read_toml(path) {
        Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
        Err(e) => (
            T::default(),
            ConfigSource::Invalid {
                path: path.to_path_buf(),
                error: e.to_string(),
            },
        ),
    }
}

/// Strict TOML read
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Validate a secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sample {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        port: Option<u16>,
    }

    #[test]
    fn test_logging_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.file.is_none());
    }

    #[test]
    fn test_read_toml_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = [not toml").unwrap();

        assert!(matches!(read_toml::<Sample>(&path), Err(Error::Config(_))));

        std::fs::write(&path, "port = 6100\n").unwrap();
        let sample: Sample = read_toml(&path).unwrap();
        assert_eq!(sample.port, Some(6100));
        assert_eq!(sample.logging, LoggingConfig::default());
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("  \t"));
    }
}
