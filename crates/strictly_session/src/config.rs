//! Engine configuration.

use crate::error::ConfigError;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Shortest token length accepted by [`EngineConfig::validate`].
pub const MIN_TOKEN_LENGTH: usize = 16;

/// Settings shared by every session a directory creates.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Length of the secret token issued at registration.
    #[serde(default = "default_token_length")]
    token_length: usize,

    /// Maximum number of live sessions in one directory, if capped.
    #[serde(default)]
    max_sessions: Option<usize>,
}

#[instrument]
fn default_token_length() -> usize {
    32
}

impl EngineConfig {
    /// Creates a configuration with explicit values.
    #[instrument]
    pub fn new(token_length: usize, max_sessions: Option<usize>) -> Self {
        Self {
            token_length,
            max_sessions,
        }
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading engine config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(
            token_length = config.token_length,
            max_sessions = ?config.max_sessions,
            "Engine config loaded"
        );
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that values are within usable bounds.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_length < MIN_TOKEN_LENGTH {
            return Err(ConfigError::new(format!(
                "token_length must be at least {}, got {}",
                MIN_TOKEN_LENGTH, self.token_length
            )));
        }
        if self.max_sessions == Some(0) {
            return Err(ConfigError::new("max_sessions must be positive"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            max_sessions: None,
        }
    }
}
