//! Configuration for the sensord client runtime
//!
//! Loads configuration from a TOML file with the minimal parameters a
//! client process needs: where the daemon listens and how often polled
//! events are fetched when the caller gives no interval.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub daemon: DaemonConfig,
    pub events: EventConfig,
}

/// Daemon endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Unix domain socket the sensor daemon listens on
    pub socket_path: String,
}

/// Event delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventConfig {
    /// Poll interval in milliseconds used when a registration carries no
    /// interval condition
    pub default_interval_ms: u32,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use sensord_client::config::ClientConfig;
    ///
    /// let config = ClientConfig::from_file("sensord-client.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration matching the stock daemon deployment
    pub fn daemon_defaults() -> Self {
        Self {
            daemon: DaemonConfig {
                socket_path: "/tmp/sf_socket".to_string(),
            },
            events: EventConfig {
                default_interval_ms: 100,
            },
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::daemon_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::daemon_defaults();
        assert_eq!(config.daemon.socket_path, "/tmp/sf_socket");
        assert_eq!(config.events.default_interval_ms, 100);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ClientConfig::daemon_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[daemon]"));
        assert!(toml_string.contains("[events]"));
        assert!(toml_string.contains("socket_path = \"/tmp/sf_socket\""));
        assert!(toml_string.contains("default_interval_ms = 100"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[daemon]
socket_path = "/run/sensord.sock"

[events]
default_interval_ms = 50
"#;

        let config: ClientConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.daemon.socket_path, "/run/sensord.sock");
        assert_eq!(config.events.default_interval_ms, 50);
    }
}
