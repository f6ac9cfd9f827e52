//! Configuration management for the fleet control daemon.
//!
//! This module handles loading, validation, and conversion of daemon
//! configuration from TOML files and command-line arguments.

use crate::cli::CliArgs;
use fleet_control::{ControlConfig, SecurityConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn default_connection_timeout() -> u64 {
    300
}

fn default_max_connections() -> usize {
    256
}

fn default_data_directory() -> String {
    "data".to_string()
}

/// Daemon configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Where group collections are persisted
    #[serde(default)]
    pub storage: StorageSettings,
    /// Inbound message limits
    #[serde(default)]
    pub security: SecurityConfig,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the control server binds to
    pub bind_address: String,
    /// Maximum number of concurrent control connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle connection timeout in seconds, 0 disables it
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding `serverGroups.json` and `proxyGroups.json`
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter, used when `RUST_LOG` is unset
    pub level: String,
    /// Whether to emit JSON formatted logs
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:5123".to_string(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
            },
            storage: StorageSettings::default(),
            security: SecurityConfig::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }
        if let Some(data_dir) = &args.data_dir {
            self.storage.data_directory = data_dir.to_string_lossy().to_string();
        }
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Converts the file settings into the control server configuration.
    pub fn to_control_config(&self) -> Result<ControlConfig, Box<dyn std::error::Error>> {
        Ok(ControlConfig {
            bind_address: self.server.bind_address.parse()?,
            data_directory: PathBuf::from(&self.storage.data_directory),
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            security: self.security.clone(),
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Returns an error string describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.server.bind_address));
        }

        if self.server.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.storage.data_directory.is_empty() {
            return Err("Data directory cannot be empty".to_string());
        }

        if self.security.max_message_size == 0 {
            return Err("max_message_size must be greater than 0".to_string());
        }
        if self.security.max_json_depth == 0 {
            return Err("max_json_depth must be greater than 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!("Invalid log level: {}", self.logging.level));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::fs;

    fn args() -> CliArgs {
        CliArgs {
            config_path: PathBuf::from("config.toml"),
            bind_address: None,
            data_dir: None,
            log_level: None,
            json_logs: false,
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address, "127.0.0.1:5123");
        assert_eq!(config.server.max_connections, 256);
        assert_eq!(config.server.connection_timeout, 300);
        assert_eq!(config.storage.data_directory, "data");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid bind address"));

        let mut config = AppConfig::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.data_directory.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.security.max_json_depth = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("verbose"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let mut args = args();
        args.bind_address = Some("0.0.0.0:7000".to_string());
        args.data_dir = Some(PathBuf::from("/srv/fleet"));
        args.log_level = Some("debug".to_string());
        args.json_logs = true;

        config.apply_cli_overrides(&args);

        assert_eq!(config.server.bind_address, "0.0.0.0:7000");
        assert_eq!(config.storage.data_directory, "/srv/fleet");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let mut config = AppConfig::default();
        config.logging.json_format = true;
        config.apply_cli_overrides(&args());
        assert_eq!(config.server.bind_address, "127.0.0.1:5123");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_to_control_config() {
        let mut config = AppConfig::default();
        config.server.connection_timeout = 0;
        config.security.max_message_size = 1024;

        let control = config.to_control_config().unwrap();
        assert_eq!(control.bind_address, "127.0.0.1:5123".parse::<SocketAddr>().unwrap());
        assert_eq!(control.data_directory, PathBuf::from("data"));
        assert_eq!(control.connection_timeout, 0);
        assert_eq!(control.security.max_message_size, 1024);
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fleetd.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:5123");
        assert!(path.exists());

        // The written default must load back.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.server.max_connections, config.server.max_connections);
        assert_eq!(reloaded.security.max_json_depth, config.security.max_json_depth);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:6123"
max_connections = 16

[storage]
data_directory = "/var/lib/fleet"

[logging]
level = "warn"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:6123");
        assert_eq!(config.server.max_connections, 16);
        assert_eq!(config.server.connection_timeout, 300);
        assert_eq!(config.storage.data_directory, "/var/lib/fleet");
        assert_eq!(config.security.max_message_size, 64 * 1024);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_invalid_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server\nbind_address = ").await.unwrap();

        let result = AppConfig::load_from_file(&temp_file.path().to_path_buf()).await;
        assert!(result.is_err());
    }
}
