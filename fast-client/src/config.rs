//! Configuration loading.
//!
//! Configuration is read from `onefast.toml` in the data directory. Every
//! section and key is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "onefast.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Local store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Cross-device sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Elapsed-time ticker configuration.
    #[serde(default)]
    pub ticker: TickerConfig,
}

/// Local store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path, relative to the data directory unless absolute
    /// (default: onefast.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Updates buffered per subscriber before it lags (default: 64).
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

/// Cross-device sync configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Propagate local changes to the paired device (default: true).
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,
    /// Address of the paired device, if any.
    pub peer_address: Option<String>,
    /// Address `listen` binds to (default: 127.0.0.1:7878).
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Seconds to wait when dialing the peer (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Elapsed-time ticker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// Cadence in milliseconds (default: 1000).
    #[serde(default = "default_interval_millis")]
    pub interval_millis: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("onefast.db")
}

fn default_subscriber_capacity() -> usize {
    crate::store::DEFAULT_SUBSCRIBER_CAPACITY
}

fn default_sync_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_interval_millis() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            peer_address: None,
            listen_address: default_listen_address(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval_millis: default_interval_millis(),
        }
    }
}

impl StoreConfig {
    /// Resolve the database path against `data_dir`.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            data_dir.join(&self.database)
        }
    }
}

impl SyncConfig {
    /// The peer to dial, if sync is enabled and one is configured.
    pub fn active_peer(&self) -> Option<&str> {
        if self.enabled {
            self.peer_address.as_deref()
        } else {
            None
        }
    }

    /// Dial timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl TickerConfig {
    /// Cadence as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Load `onefast.toml` from `data_dir`, or use defaults if it is absent.
    pub fn load_or_default(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.ticker.interval_millis == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "ticker.interval_millis must be positive".into(),
            });
        }
        if self.store.subscriber_capacity == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "store.subscriber_capacity must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The file parsed but a value is out of range.
    #[error("invalid config file {path}: {reason}")]
    Invalid {
        /// Path to the configuration file.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.store.database, PathBuf::from("onefast.db"));
        assert_eq!(config.store.subscriber_capacity, 64);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.peer_address, None);
        assert_eq!(config.sync.listen_address, "127.0.0.1:7878");
        assert_eq!(config.ticker.interval(), Duration::from_secs(1));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ticker.interval_millis, 1000);
        assert_eq!(config.sync.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[store]
database = "/var/lib/onefast/state.db"

[sync]
peer_address = "192.168.1.20:7878"
listen_address = "0.0.0.0:7878"

[ticker]
interval_millis = 250
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.store.database,
            PathBuf::from("/var/lib/onefast/state.db")
        );
        assert_eq!(config.sync.active_peer(), Some("192.168.1.20:7878"));
        assert_eq!(config.sync.listen_address, "0.0.0.0:7878");
        assert_eq!(config.ticker.interval(), Duration::from_millis(250));
    }

    #[test]
    fn disabled_sync_has_no_active_peer() {
        let toml = r#"
[sync]
enabled = false
peer_address = "10.0.0.2:7878"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sync.active_peer(), None);
    }

    #[test]
    fn database_path_resolves_against_data_dir() {
        let config = StoreConfig::default();
        assert_eq!(
            config.database_path(Path::new("/data")),
            PathBuf::from("/data/onefast.db")
        );

        let absolute = StoreConfig {
            database: PathBuf::from("/tmp/x.db"),
            ..StoreConfig::default()
        };
        assert_eq!(
            absolute.database_path(Path::new("/data")),
            PathBuf::from("/tmp/x.db")
        );
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.store.subscriber_capacity, 64);
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[ticker]\ninterval_millis = 500\n",
        )
        .unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.ticker.interval_millis, 500);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[ticker]\ninterval_millis = 0\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[store\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = Config::from_file(Path::new("/nonexistent/onefast.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
