//! Configuration module for data-service.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "data-service")]
#[command(author = "data-service authors")]
#[command(version = "0.1.0")]
#[command(about = "A single-resource key/value server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:8002)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum number of bytes read from a connection
    #[arg(long)]
    pub max_request_size: Option<usize>,

    /// Per-connection deadline in seconds (0 = no deadline)
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Maximum number of connections served at once
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum request size in bytes
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Per-connection deadline in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_request_size: default_max_request_size(),
            connection_timeout: default_connection_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Entries present at startup
    #[serde(default = "default_seed")]
    pub seed: BTreeMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
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

fn default_listen() -> String {
    "127.0.0.1:8002".to_string()
}

fn default_max_request_size() -> usize {
    512
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    10000
}

fn default_seed() -> BTreeMap<String, String> {
    BTreeMap::from([("first".to_string(), "42".to_string())])
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub max_request_size: usize,
    pub connection_timeout: Option<Duration>,
    pub max_connections: usize,
    pub seed: BTreeMap<String, String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let toml_config = TomlConfig::default();
        Config {
            listen: toml_config.server.listen,
            max_request_size: toml_config.server.max_request_size,
            connection_timeout: Some(Duration::from_secs(toml_config.server.connection_timeout)),
            max_connections: toml_config.server.max_connections,
            seed: toml_config.storage.seed,
            log_level: toml_config.logging.level,
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let timeout_secs = cli
            .timeout
            .unwrap_or(toml_config.server.connection_timeout);

        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            max_request_size: cli
                .max_request_size
                .unwrap_or(toml_config.server.max_request_size),
            connection_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            seed: toml_config.storage.seed,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_size == 0 {
            return Err(ConfigError::Invalid(
                "max_request_size must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:8002");
        assert_eq!(config.server.max_request_size, 512);
        assert_eq!(config.server.connection_timeout, 30);
        assert_eq!(config.storage.seed.get("first").map(String::as_str), Some("42"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:9000"
            max_request_size = 4096
            connection_timeout = 0
            max_connections = 64

            [storage.seed]
            alpha = "1"
            beta = "two words"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.server.max_request_size, 4096);
        assert_eq!(config.server.connection_timeout, 0);
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(config.storage.seed.len(), 2);
        assert_eq!(config.storage.seed["beta"], "two words");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let cli = CliArgs::parse_from([
            "data-service",
            "--listen",
            "127.0.0.1:0",
            "--timeout",
            "5",
            "--log-level",
            "trace",
        ]);
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "0.0.0.0:9000"
            connection_timeout = 0
            max_request_size = 1024
            "#,
        )
        .unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.listen, "127.0.0.1:0");
        assert_eq!(config.connection_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.max_request_size, 1024);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let cli = CliArgs::parse_from(["data-service", "--timeout", "0"]);
        let config = Config::merge(cli, TomlConfig::default());
        assert_eq!(config.connection_timeout, None);
    }

    #[test]
    fn test_zero_request_size_rejected() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_request_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
