//! Combined configuration file for the driver.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strictly_session::{ConfigError, EngineConfig};
use strictly_tictactoe::TicTacToeConfig;
use tracing::{debug, info, instrument};

/// Contents of the driver's TOML file.
///
/// Both tables are optional; missing tables and keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct GamesConfig {
    /// Session engine settings.
    #[serde(default)]
    engine: EngineConfig,

    /// Tic-tac-toe settings applied to every match.
    #[serde(default)]
    tictactoe: TicTacToeConfig,
}

impl GamesConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(
            token_length = config.engine.token_length(),
            move_time_limit_ms = config.tictactoe.move_time_limit_ms(),
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.engine.validate()?;
        config.tictactoe.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }
}
