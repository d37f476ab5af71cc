//! Server and client settings with RON persistence.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{net::client::OutboxLimits, GAME_VERSION};

pub const SERVER_CONFIG_FILE: &str = "server.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] ron::Error)
}

/// Settings for the dedicated server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub host: String,
    pub port: u16,
    /// Clients must report exactly this version.
    pub version: String,
    pub world_seed: u64,
    /// Minimum time between two `players_update` broadcasts.
    pub broadcast_interval_ms: u64,
    /// A new connection must send `version_check` within this time.
    pub handshake_timeout_ms: u64,
    /// Frames a client may have queued before it is disconnected.
    pub outbox_capacity: usize,
    pub write_timeout_ms: u64,
    /// Used when `RUST_LOG` is not set.
    pub log_level: String
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5555,
            version: GAME_VERSION.to_string(),
            world_seed: 0,
            broadcast_interval_ms: 50,
            handshake_timeout_ms: 3000,
            outbox_capacity: 1024,
            write_timeout_ms: 5000,
            log_level: "info".to_string()
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    // a zero duration is rejected by the socket apis
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms.max(1))
    }

    pub fn outbox_limits(&self) -> OutboxLimits {
        OutboxLimits {
            capacity: self.outbox_capacity.max(1),
            write_timeout: Duration::from_millis(self.write_timeout_ms.max(1))
        }
    }

    /// Load `server.ron` from `config_dir`, writing the defaults there first
    /// if the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(SERVER_CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            let config: ServerConfig = ron::from_str(&contents).map_err(ConfigError::Parse)?;
            info!("loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = ServerConfig::default();
            config.save(config_dir)?;
            info!("created default config at {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::Write)?;

        let pretty = ron::ser::PrettyConfig::new().depth_limit(2);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(config_dir.join(SERVER_CONFIG_FILE), serialized).map_err(ConfigError::Write)?;
        Ok(())
    }
}

/// Settings for a client connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Receive loop poll timeout. Short so shutdown is noticed quickly.
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub version: String,
    /// Chunks fetched around the player in each direction.
    pub preload_radius: i32
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 10,
            connect_timeout_ms: 3000,
            version: GAME_VERSION.to_string(),
            preload_radius: 2
        }
    }
}

impl ClientConfig {
    pub fn with_version(version: impl Into<String>) -> Self {
        Self { version: version.into(), ..Self::default() }
    }

    // a zero duration is rejected by the socket apis
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5555");
        assert_eq!(config.version, "1.1.0");
        assert_eq!(config.broadcast_interval(), Duration::from_millis(50));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(3));
        assert_eq!(config.outbox_limits(), OutboxLimits::default());

        let client = ClientConfig::default();
        assert_eq!(client.read_timeout(), Duration::from_millis(10));
        assert_eq!(client.preload_radius, 2);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: ServerConfig = ron::from_str("(port: 6000, world_seed: 9)").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.world_seed, 9);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.port = 7000;
        config.version = "2.0.0".to_string();

        config.save(dir.path()).unwrap();
        let loaded = ServerConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn load_creates_the_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("conf");
        let config = ServerConfig::load_or_create(&nested).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(nested.join(SERVER_CONFIG_FILE).exists());
    }

    #[test]
    fn invalid_ron_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_CONFIG_FILE), "{{not ron}}").unwrap();
        assert!(matches!(ServerConfig::load_or_create(dir.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn zero_timeouts_are_clamped() {
        let client = ClientConfig { read_timeout_ms: 0, connect_timeout_ms: 0, ..ClientConfig::default() };
        assert_eq!(client.read_timeout(), Duration::from_millis(1));
        assert_eq!(client.connect_timeout(), Duration::from_millis(1));
        assert_eq!(ClientConfig::with_version("1.0.0").version, "1.0.0");
    }
}
