//! Session status and the summary read model.

use crate::player::PlayerId;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a session.
///
/// Only `NotStarted -> Started -> Ended | Error` is ever taken.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SessionStatus {
    /// Waiting for every player to connect.
    NotStarted = 0,
    /// The game is running.
    Started = 1,
    /// The game finished normally.
    Ended = 2,
    /// The game finished on an internal error reported by the rules module.
    Error = 3,
}

impl SessionStatus {
    /// Whether the game is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Started) | (Self::Started, Self::Ended | Self::Error)
        )
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Started,
            2 => Self::Ended,
            _ => Self::Error,
        }
    }
}

/// Lock-free mirror of a session's status.
///
/// Written only while the session lock is held, so writes are ordered;
/// reads never block, which lets event listeners inspect the status
/// while a mutation is still delivering events.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SessionStatus::NotStarted as u8))
    }

    pub(crate) fn get(&self) -> SessionStatus {
        SessionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advances the status. Returns `false` and leaves it unchanged if the
    /// step is not a legal lifecycle transition.
    pub(crate) fn advance(&self, next: SessionStatus) -> bool {
        let current = self.get();
        if !current.can_advance_to(next) {
            return false;
        }
        self.0.store(next as u8, Ordering::Release);
        true
    }
}

/// Status-dependent part of a [`SessionSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum SessionPhase {
    /// Waiting for players.
    NotStarted,
    /// Running; `next_player` is whoever is on the clock.
    Started {
        /// The player expected to move.
        next_player: Option<PlayerId>,
    },
    /// Finished normally; `winner` is `None` for a draw.
    Ended {
        /// The winner, if any.
        winner: Option<PlayerId>,
    },
    /// Finished on an internal error.
    Error {
        /// The winner the rules module reported, if any.
        winner: Option<PlayerId>,
    },
}

impl SessionPhase {
    /// The status this phase describes.
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::NotStarted => SessionStatus::NotStarted,
            Self::Started { .. } => SessionStatus::Started,
            Self::Ended { .. } => SessionStatus::Ended,
            Self::Error { .. } => SessionStatus::Error,
        }
    }
}

/// Public description of a session, suitable for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary<P> {
    /// The session identifier.
    pub session_id: SessionId,
    /// Game parameters.
    pub params: P,
    /// Players that have connected at least once.
    pub connected_players: usize,
    /// Players the game needs.
    pub total_players: usize,
    /// Status plus the fields that only exist in that status.
    #[serde(flatten)]
    pub phase: SessionPhase,
}
