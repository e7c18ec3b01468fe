//! Configuration management for CodeViz

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::discovery;

/// Main configuration for the CodeViz service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// File discovery configuration
    pub discovery: DiscoveryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one artifact folder per project
    pub data_dir: PathBuf,

    /// Path to the SQLite metadata database
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database: PathBuf::from("codeviz.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// File discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Extra directory names to skip, on top of the built-in set
    pub exclude_dirs: Vec<String>,

    /// Extract files on the rayon thread pool
    pub parallel: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: Vec::new(),
            parallel: true,
        }
    }
}

impl DiscoveryConfig {
    /// Built-in exclusions plus the configured ones
    pub fn exclusions(&self) -> Vec<String> {
        discovery::exclusion_set(&self.exclude_dirs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str("[server]\nport = 9000\n\n[discovery]\nexclude_dirs = [\"vendor\"]\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.database, PathBuf::from("codeviz.db"));
        assert!(config.discovery.parallel);
        assert!(config.discovery.exclusions().contains(&"vendor".to_string()));
        assert!(config.discovery.exclusions().contains(&"__pycache__".to_string()));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codeviz.toml");
        let mut config = Config::default();
        config.logging.format = "compact".to_string();
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.logging.format, "compact");
        assert_eq!(loaded.storage.data_dir, PathBuf::from("data"));
    }
}
