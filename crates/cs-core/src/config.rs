//! Configuration structures for codestream.
//!
//! This module provides configuration types for every component of the
//! service:
//!
//! - [`WatchConfig`] - Watcher settings (recursion, event channel size)
//! - [`MonitorConfig`] - Which roots to watch and how paths are classified
//! - [`ServerConfig`] - Listener address and per-client queue size
//! - [`ScaffoldConfig`] - Where `create_project` requests create projects
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a configuration file only has to name the values it
//! changes.

use std::collections::BTreeMap;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 8765;

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use cs_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert_eq!(config.event_channel_capacity, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether to watch subdirectories of each root.
    pub recursive: bool,

    /// Capacity of the channel between the notification thread and the
    /// event consumer.
    pub event_channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            event_channel_capacity: 1024,
        }
    }
}

/// Configuration for the monitor session.
///
/// `paths` are the explicit roots supplied at startup. When
/// `include_default_dirs` is set they are merged with the common development
/// directories found under the home directory.
///
/// The `extra_*` fields extend the built-in classification tables. Extensions
/// are written with their leading dot (`".vue"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Explicit root directories to watch.
    pub paths: Vec<Utf8PathBuf>,

    /// Whether to add the default development directories.
    pub include_default_dirs: bool,

    /// Additional directory names that make a path irrelevant.
    pub extra_ignored_dirs: Vec<String>,

    /// Additional extensions that make a path irrelevant.
    pub extra_ignored_extensions: Vec<String>,

    /// Additional extension to language mappings.
    pub extra_languages: BTreeMap<String, String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include_default_dirs: true,
            extra_ignored_dirs: Vec::new(),
            extra_ignored_extensions: Vec::new(),
            extra_languages: BTreeMap::new(),
        }
    }
}

/// Configuration for the WebSocket listener.
///
/// # Examples
///
/// ```
/// use cs_core::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.address(), "127.0.0.1:8765");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or IP address to bind.
    pub host: String,

    /// TCP port to bind. `0` asks the OS for a free port.
    pub port: u16,

    /// Number of outbound messages buffered per client before the client is
    /// considered stalled and disconnected.
    pub client_queue_capacity: usize,

    /// Longest a single socket write may take, in milliseconds, before the
    /// client is treated as unresponsive and its connection is dropped.
    pub send_timeout_ms: u64,
}

impl ServerConfig {
    /// Returns the `host:port` string passed to the listener.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The socket write bound as a [`Duration`].
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: DEFAULT_PORT,
            client_queue_capacity: 256,
            send_timeout_ms: 10_000,
        }
    }
}

/// Configuration for project scaffolding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldConfig {
    /// Directory new projects are created in.
    ///
    /// `None` resolves to `~/Projects`.
    pub workspace_dir: Option<Utf8PathBuf>,
}

impl ScaffoldConfig {
    /// Resolves the directory projects are created in.
    ///
    /// Falls back to the current directory when no home directory is known.
    #[must_use]
    pub fn resolve_workspace(&self) -> Utf8PathBuf {
        self.workspace_dir.clone().unwrap_or_else(|| {
            home_dir().map_or_else(|| Utf8PathBuf::from("."), |home| home.join("Projects"))
        })
    }
}

/// Root configuration for codestream.
///
/// # Examples
///
/// ```
/// use cs_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"server": {"port": 9000}}"#)?;
/// assert_eq!(config.server.port, 9000);
/// assert!(config.watch.recursive);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File watcher configuration.
    pub watch: WatchConfig,

    /// Monitor session configuration.
    pub monitor: MonitorConfig,

    /// Listener configuration.
    pub server: ServerConfig,

    /// Project scaffolding configuration.
    pub scaffold: ScaffoldConfig,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::InvalidPath {
                path: path.to_owned(),
                reason: "configuration file not found".to_owned(),
            });
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.event_channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "watch.event_channel_capacity",
                "must be greater than zero",
            ));
        }
        if self.server.client_queue_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "server.client_queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.server.send_timeout_ms == 0 {
            return Err(ConfigError::invalid_option(
                "server.send_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid_option("server.host", "must not be empty"));
        }
        Ok(())
    }
}

/// Returns the current user's home directory as a UTF-8 path.
///
/// Returns `None` if the home directory is unknown or not valid UTF-8.
#[must_use]
pub fn home_dir() -> Option<Utf8PathBuf> {
    dirs::home_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert!(config.recursive);
        assert_eq!(config.event_channel_capacity, 1024);
    }

    #[test]
    fn test_monitor_config_defaults() {
        let config = MonitorConfig::default();
        assert!(config.paths.is_empty());
        assert!(config.include_default_dirs);
        assert!(config.extra_languages.is_empty());
    }

    #[test]
    fn test_server_config_address() {
        let config = ServerConfig {
            host: "0.0.0.0".to_owned(),
            port: 9230,
            ..ServerConfig::default()
        };
        assert_eq!(config.address(), "0.0.0.0:9230");
    }

    #[test]
    fn test_scaffold_workspace_override() {
        let config = ScaffoldConfig {
            workspace_dir: Some(Utf8PathBuf::from("/tmp/work")),
        };
        assert_eq!(config.resolve_workspace(), Utf8PathBuf::from("/tmp/work"));
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"monitor": {"paths": ["/srv/code"], "include_default_dirs": false}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.monitor.paths, vec![Utf8PathBuf::from("/srv/code")]);
        assert!(!config.monitor.include_default_dirs);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.watch.event_channel_capacity, 1024);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config
            .monitor
            .extra_languages
            .insert(".vue".to_owned(), "vue".to_owned());
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.server.client_queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("client_queue_capacity"));
    }

    #[test]
    fn test_validate_rejects_zero_send_timeout() {
        let mut config = Config::default();
        assert_eq!(config.server.send_timeout(), Duration::from_secs(10));
        config.server.send_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("send_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = Config::default();
        config.server.host = "  ".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("codestream.json")).unwrap();
        std::fs::write(&path, r#"{"server": {"port": 4000}}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = Config::from_json_file(Utf8Path::new("/nonexistent/codestream.json")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }

    #[test]
    fn test_from_json_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bad.json")).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = Config::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
