//! Configuration module
//!
//! Handles loading and saving UDTX client configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::network::NetworkConfig;
use crate::protocol::{DEFAULT_HOST, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, TEST_DCRN};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// CDE endpoint settings
    #[serde(default)]
    pub cde: CdeConfig,

    /// Data consumer identity
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

/// CDE endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdeConfig {
    /// Host of the inbound message service
    #[serde(default = "default_host")]
    pub host: String,
    /// Inbound message port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connection timeout in ms
    #[serde(default = "default_timeout")]
    pub connect_timeout_ms: u64,
    /// Send/receive timeout in ms
    #[serde(default = "default_timeout")]
    pub io_timeout_ms: u64,
    /// Largest frame accepted, in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    5000
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

impl Default for CdeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_timeout(),
            io_timeout_ms: default_timeout(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl From<&CdeConfig> for NetworkConfig {
    fn from(cde: &CdeConfig) -> Self {
        Self {
            host: cde.host.clone(),
            port: cde.port,
            connect_timeout: Duration::from_millis(cde.connect_timeout_ms),
            io_timeout: Duration::from_millis(cde.io_timeout_ms),
            max_frame_size: cde.max_frame_size,
        }
    }
}

/// Data consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Registration number (0 = test mode)
    #[serde(default)]
    pub dcrn: u32,
    /// Name given to activated nodes when none is passed
    pub node_name: Option<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            dcrn: TEST_DCRN,
            node_name: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("udtx/config.toml")),
            Some(PathBuf::from("./udtx.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first of `paths` that exists, or defaults if none does.
    /// An existing file that cannot be read or parsed is an error.
    pub fn load_first(paths: &[PathBuf]) -> ConfigResult<Self> {
        for path in paths {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn network(&self) -> NetworkConfig {
        NetworkConfig::from(&self.cde)
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        consumer: ConsumerConfig {
            dcrn: 1234,
            node_name: Some("Node 1".to_string()),
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cde.host, DEFAULT_HOST);
        assert_eq!(config.cde.port, DEFAULT_PORT);
        assert_eq!(config.consumer.dcrn, TEST_DCRN);
    }

    #[test]
    fn test_network_config_conversion() {
        let mut config = Config::default();
        config.cde.io_timeout_ms = 250;
        let net = config.network();
        assert_eq!(net.io_timeout, Duration::from_millis(250));
        assert_eq!(net.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.cde.port = 4000;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.cde.port, 4000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[cde]\nhost = \"localhost\"\n").unwrap();
        assert_eq!(parsed.cde.host, "localhost");
        assert_eq!(parsed.cde.port, DEFAULT_PORT);
        assert_eq!(parsed.cde.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_load_first_skips_missing_paths() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[consumer]\ndcrn = 77").unwrap();

        let paths = [PathBuf::from("/nonexistent/udtx.toml"), file.path().to_path_buf()];
        let loaded = Config::load_first(&paths).unwrap();
        assert_eq!(loaded.consumer.dcrn, 77);
    }

    #[test]
    fn test_load_first_reports_broken_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[consumer]\ndcrn = \"not a number\"").unwrap();

        let result = Config::load_first(&[file.path().to_path_buf()]);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_first_without_files_is_default() {
        let loaded = Config::load_first(&[PathBuf::from("/nonexistent/udtx.toml")]).unwrap();
        assert_eq!(loaded.cde.port, DEFAULT_PORT);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/udtx.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.consumer.dcrn, 1234);
    }
}
