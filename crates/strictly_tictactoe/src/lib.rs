//! Strictly Tic-Tac-Toe - reference rules module for `strictly_session`.
//!
//! Slot 1 plays X and moves first; slot 2 plays O. Each turn runs on a
//! move clock whose expiry is handled by a configurable [`TimeoutPolicy`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod rules;
mod types;

pub use config::{TicTacToeConfig, TimeoutPolicy};
pub use rules::{GameState, Move, Outcome, TicTacToe, TicTacToeFactory};
pub use types::{Board, Mark, Position, Square};
