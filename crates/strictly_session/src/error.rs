//! Session engine error types.

use crate::player::PlayerId;
use derive_more::{Display, Error};
use tracing::instrument;

/// The reason a session operation was refused.
///
/// Callers match on the kind to pick the external response; the
/// registration, token and move kinds are all expected outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionErrorKind {
    /// The requested player slot is already registered.
    #[display("slot {_0} is already taken")]
    SlotTaken(PlayerId),
    /// The requested player slot is not one the game has.
    #[display("slot {_0} does not exist in this game")]
    InvalidSlot(PlayerId),
    /// Every player slot is registered.
    #[display("room is full")]
    RoomFull,
    /// The token does not belong to any registered player.
    #[display("unknown token")]
    UnknownToken,
    /// The player slot was never registered.
    #[display("player {_0} is not registered")]
    UnknownPlayer(PlayerId),
    /// The game is not in progress (not yet started, or already over).
    #[display("game not started")]
    GameNotStarted,
    /// The rules module rejected the move.
    #[display("illegal move")]
    IllegalMove,
    /// No tokio runtime is available to drive the turn clock.
    #[display("no async runtime available for the turn clock")]
    RuntimeUnavailable,
    /// A previous mutation panicked inside the rules module.
    #[display("session state poisoned by a failed mutation")]
    Poisoned,
    /// The directory already holds its maximum number of sessions.
    #[display("directory is full ({_0} sessions)")]
    DirectoryFull(usize),
    /// The rules factory refused the game configuration.
    #[display("rules module rejected configuration: {_0}")]
    RulesRejected(String),
    /// The engine configuration failed validation.
    #[display("invalid engine configuration: {_0}")]
    InvalidConfig(String),
    /// No unused token could be drawn at the configured length.
    #[display("could not generate a unique player token")]
    TokenSpaceExhausted,
}

/// Session error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Session error: {} at {}:{}", kind, file, line)]
pub struct SessionError {
    /// What went wrong.
    pub kind: SessionErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: SessionErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &SessionErrorKind {
        &self.kind
    }
}

impl From<SessionErrorKind> for SessionError {
    #[track_caller]
    fn from(kind: SessionErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
