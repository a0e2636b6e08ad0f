//! Configuration management for the gatekeeper.
//!
//! This module handles loading, validation, and conversion of the TOML
//! configuration file into the server's [`ServerConfig`]. Every section and
//! key is optional; missing values take the defaults below.

use anyhow::Context;
use gate_server::{GuardSettings, MessageSettings, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and protocol settings
    pub server: ServerSettings,
    /// Verification thresholds
    pub guard: GuardSettings,
    /// Player-facing texts (`&` colour markers allowed)
    pub messages: MessageSettings,
    /// Plugin selection
    pub plugins: PluginSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Listener and protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "0.0.0.0:25565")
    pub bind_address: String,
    /// Server-list description
    pub motd: String,
    /// Version name shown in the server list
    pub version_name: String,
    /// Player limit shown in the server list
    pub max_players: u32,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Seconds a client has to finish logging in
    pub login_timeout_secs: u64,
    /// Seconds between keep-alives
    pub keep_alive_secs: u64,
    /// Frames at least this large are compressed; negative disables compression
    pub compression_threshold: i64,
    /// Log every packet
    pub debug: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_address: defaults.bind_address.to_string(),
            motd: defaults.motd,
            version_name: defaults.version_name,
            max_players: defaults.max_players,
            max_connections: defaults.max_connections,
            login_timeout_secs: defaults.login_timeout.as_secs(),
            keep_alive_secs: defaults.keep_alive_interval.as_secs(),
            compression_threshold: defaults
                .compression_threshold
                .map_or(-1, |threshold| threshold as i64),
            debug: defaults.debug,
        }
    }
}

/// Plugin selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Plugin whitelist - if non-empty, only these plugins will be loaded
    pub whitelist: Vec<String>,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to the
    /// path and returns it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Checks the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.server.bind_address));
        }
        if self.server.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        if self.server.login_timeout_secs == 0 {
            return Err("login_timeout_secs must be at least 1".to_string());
        }
        if self.server.keep_alive_secs == 0 {
            return Err("keep_alive_secs must be at least 1".to_string());
        }
        if self.server.compression_threshold > i32::MAX as i64 {
            return Err(format!(
                "compression_threshold {} is too large",
                self.server.compression_threshold
            ));
        }

        if self.guard.tick_interval_ms == 0 {
            return Err("guard.tick_interval_ms must be at least 1".to_string());
        }
        if self.guard.timeout_secs == 0 {
            return Err("guard.timeout_secs must be at least 1".to_string());
        }
        if !self.guard.max_height.is_finite() {
            return Err("guard.max_height must be a finite number".to_string());
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LEVELS:?}",
                self.logging.level
            ));
        }

        Ok(())
    }

    /// Converts to the server's runtime configuration.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        let bind_address = self
            .server
            .bind_address
            .parse()
            .with_context(|| format!("invalid bind address {}", self.server.bind_address))?;

        Ok(ServerConfig {
            bind_address,
            motd: self.server.motd.clone(),
            version_name: self.server.version_name.clone(),
            max_players: self.server.max_players,
            max_connections: self.server.max_connections,
            login_timeout: Duration::from_secs(self.server.login_timeout_secs),
            keep_alive_interval: Duration::from_secs(self.server.keep_alive_secs),
            compression_threshold: usize::try_from(self.server.compression_threshold).ok(),
            debug: self.server.debug,
            guard: self.guard.clone(),
            messages: self.messages.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.port(), 25565);
        assert_eq!(server_config.compression_threshold, Some(256));
        assert_eq!(server_config.login_timeout, Duration::from_secs(30));
        assert_eq!(server_config.guard, GuardSettings::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        config.server.bind_address = "127.0.0.1:25565".to_string();
        config.guard.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        config.guard.tick_interval_ms = 50;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_threshold_disables_compression() {
        let mut config = AppConfig::default();
        config.server.compression_threshold = -1;
        assert_eq!(config.to_server_config().unwrap().compression_threshold, None);
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gatekeeper.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_partial_file_fills_defaults() {
        let toml_content = r#"
[server]
bind_address = "127.0.0.1:25570"
max_players = 20
compression_threshold = -1

[guard]
min_slot_changes = 10
timeout_secs = 30

[messages]
guard_passed = "&aWelcome through!"

[plugins]
whitelist = ["commands"]

[logging]
level = "debug"
"#;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lobby.toml");
        tokio::fs::write(&path, toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:25570");
        assert_eq!(config.server.max_players, 20);
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.guard.min_slot_changes, 10);
        assert_eq!(config.guard.min_packets, 50);
        assert_eq!(config.messages.guard_passed, "&aWelcome through!");
        assert_eq!(config.messages.server_stopped, "Server stopped");
        assert_eq!(config.plugins.whitelist, vec!["commands"]);
        assert_eq!(config.logging.level, "debug");

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.compression_threshold, None);
        assert_eq!(server_config.guard.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "[server\nbind_address = ").await.unwrap();
        assert!(AppConfig::load_from_file(&path).await.is_err());
    }
}
