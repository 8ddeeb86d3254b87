//! Tic-tac-toe game configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strictly_session::ConfigError;
use tracing::instrument;

/// What happens when the player on the clock runs out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// The player on the clock loses.
    Forfeit,
    /// The turn passes to the opponent.
    Skip,
    /// A strike is recorded and the same player stays on the clock.
    /// Reaching `max_strikes` forfeits.
    Strike {
        /// Strikes that forfeit the game.
        max_strikes: u32,
    },
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::Strike { max_strikes: 3 }
    }
}

/// Per-game settings.
///
/// ```toml
/// move_time_limit_ms = 15000
/// timeout_policy = { kind = "strike", max_strikes = 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct TicTacToeConfig {
    /// Time each player has per move, in milliseconds. `0` disables the clock.
    #[serde(default = "default_move_time_limit_ms")]
    move_time_limit_ms: u64,

    /// Timeout handling.
    #[serde(default)]
    timeout_policy: TimeoutPolicy,
}

fn default_move_time_limit_ms() -> u64 {
    30_000
}

impl TicTacToeConfig {
    /// Creates a configuration with explicit values.
    pub fn new(move_time_limit_ms: u64, timeout_policy: TimeoutPolicy) -> Self {
        Self {
            move_time_limit_ms,
            timeout_policy,
        }
    }

    /// The per-move clock, if any.
    pub fn move_time_limit(&self) -> Option<Duration> {
        (self.move_time_limit_ms > 0).then(|| Duration::from_millis(self.move_time_limit_ms))
    }

    /// Checks that values are within usable bounds.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let TimeoutPolicy::Strike { max_strikes: 0 } = self.timeout_policy {
            return Err(ConfigError::new("max_strikes must be at least 1"));
        }
        Ok(())
    }
}

impl Default for TicTacToeConfig {
    fn default() -> Self {
        Self {
            move_time_limit_ms: default_move_time_limit_ms(),
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}
