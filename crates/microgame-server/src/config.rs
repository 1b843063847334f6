//! Configuration loading for the coordinator.
//!
//! Configuration lives in an optional YAML file. Every field has a default
//! matching the reference game client, so an absent file yields a working
//! server. The file path comes from `MICROGAME_CONFIG`, falling back to
//! `microgame-config.yaml` in the working directory.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//! game:
//!   tick_interval_ms: 7000
//!   winner_pause_ms: 500
//!   result_threshold: 3
//! script:
//!   path: test-protocol.json
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::server::ServerConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "MICROGAME_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "microgame-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level coordinator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CoordinatorConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Microgame timing and thresholds.
    #[serde(default)]
    pub game: GameConfig,

    /// Scripted message source.
    #[serde(default)]
    pub script: ScriptConfig,
}

/// Microgame loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Period between scheduler ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Pause between `microgame-end` and the winner message, in milliseconds.
    pub winner_pause_ms: u64,
    /// Number of distinct results that completes a round.
    pub result_threshold: usize,
    /// Delay before a new connection is sent the icon list, in milliseconds.
    pub initial_icons_delay_ms: u64,
    /// Text broadcast on announce ticks.
    pub announce_text: String,
    /// Text sent to the round winner.
    pub winner_text: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 7000,
            winner_pause_ms: 500,
            result_threshold: 3,
            initial_icons_delay_ms: 100,
            announce_text: String::from("Test message"),
            winner_text: String::from("You won!"),
        }
    }
}

impl GameConfig {
    /// Scheduler tick period.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Pause before the winner is told.
    pub const fn winner_pause(&self) -> Duration {
        Duration::from_millis(self.winner_pause_ms)
    }

    /// Delay before a fresh connection hears the icon list.
    pub const fn initial_icons_delay(&self) -> Duration {
        Duration::from_millis(self.initial_icons_delay_ms)
    }
}

/// Where the scripted server messages come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Path to the protocol script file.
    pub path: PathBuf,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("test-protocol.json"),
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate configuration from YAML text.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load configuration the way the binary does.
    ///
    /// An explicitly named file (via [`CONFIG_PATH_ENV`]) must exist. The
    /// default file is optional. A `PORT` variable overrides the port.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    tracing::info!("Config file not found, using defaults");
                    Self::default()
                }
            }
        };

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("invalid PORT: {e}")))?;
        }

        Ok(config)
    }

    /// Reject values the runtime cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "game.tick_interval_ms must be greater than 0",
            )));
        }
        if self.game.result_threshold == 0 {
            return Err(ConfigError::Invalid(String::from(
                "game.result_threshold must be at least 1",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = CoordinatorConfig::parse("{}").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.game.tick_interval(), Duration::from_secs(7));
        assert_eq!(config.game.winner_pause(), Duration::from_millis(500));
        assert_eq!(config.game.result_threshold, 3);
        assert_eq!(config.script.path, PathBuf::from("test-protocol.json"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = "game:\n  tick_interval_ms: 1000\nserver:\n  port: 9001\n";
        let config = CoordinatorConfig::parse(yaml).unwrap();
        assert_eq!(config.game.tick_interval_ms, 1000);
        assert_eq!(config.game.winner_text, "You won!");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = CoordinatorConfig::parse("game:\n  tick_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = CoordinatorConfig::parse("game:\n  result_threshold: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = CoordinatorConfig::parse("game: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = CoordinatorConfig::from_file(Path::new("/nonexistent/microgame.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
