//! Game logic and rules for tic-tac-toe.

use crate::config::{TicTacToeConfig, TimeoutPolicy};
use crate::types::{Board, Mark, Position, Square};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strictly_session::{ConfigError, GameRules, PlayerId, RulesFactory};
use tracing::{debug, info, instrument};

/// A tic-tac-toe move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display("{position}")]
pub struct Move {
    /// Where to place the mark.
    pub position: Position,
}

impl Move {
    /// Creates a move at `position`.
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

/// How the game stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// Game is ongoing.
    InProgress,
    /// Three in a row.
    Won {
        /// The winning mark.
        mark: Mark,
    },
    /// Full board, no line.
    Draw,
    /// A player lost on the clock.
    Forfeited {
        /// The mark that ran out of time.
        loser: Mark,
    },
}

/// Complete game state. Nothing is hidden, so this is also every player's view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// The board.
    pub board: Board,
    /// Mark on the clock.
    pub to_move: Mark,
    /// Game result so far.
    pub outcome: Outcome,
    /// Positions played, in order.
    pub history: Vec<Position>,
    /// Clock timeouts per mark, X first.
    pub strikes: [u32; 2],
    /// Total think-time per mark in milliseconds, X first.
    pub think_time_ms: [u64; 2],
}

impl GameState {
    /// Creates a new game.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            to_move: Mark::X,
            outcome: Outcome::InProgress,
            history: Vec::new(),
            strikes: [0; 2],
            think_time_ms: [0; 2],
        }
    }

    /// Whether moves are still accepted.
    pub fn in_progress(&self) -> bool {
        self.outcome == Outcome::InProgress
    }

    /// The winning mark, if any.
    pub fn winner(&self) -> Option<Mark> {
        match self.outcome {
            Outcome::Won { mark } => Some(mark),
            Outcome::Forfeited { loser } => Some(loser.opponent()),
            Outcome::InProgress | Outcome::Draw => None,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tic-tac-toe rules module.
#[derive(Debug, Clone)]
pub struct TicTacToe {
    config: TicTacToeConfig,
    state: GameState,
}

impl TicTacToe {
    /// Creates a new game.
    #[instrument]
    pub fn new(config: TicTacToeConfig) -> Self {
        Self {
            config,
            state: GameState::new(),
        }
    }

    /// Returns the current game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    fn update_outcome(&mut self) {
        if let Some(mark) = self.state.board.winner() {
            self.state.outcome = Outcome::Won { mark };
        } else if self.state.board.is_full() {
            self.state.outcome = Outcome::Draw;
        }
    }

    fn forfeit(&mut self) {
        let loser = self.state.to_move;
        info!(%loser, "Player forfeits on the clock");
        self.state.outcome = Outcome::Forfeited { loser };
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new(TicTacToeConfig::default())
    }
}

impl GameRules for TicTacToe {
    type Params = TicTacToeConfig;
    type Move = Move;
    type State = GameState;
    type View = GameState;

    fn player_count(&self) -> usize {
        2
    }

    fn params(&self) -> TicTacToeConfig {
        self.config.clone()
    }

    fn next_player(&self) -> Option<PlayerId> {
        self.state
            .in_progress()
            .then(|| self.state.to_move.player())
    }

    fn is_valid_move(&self, player: PlayerId, mv: &Move) -> bool {
        self.state.in_progress()
            && Mark::for_player(player) == Some(self.state.to_move)
            && self.state.board.is_empty(mv.position)
    }

    #[instrument(skip(self))]
    fn apply_move(&mut self, player: PlayerId, mv: &Move, think_time: Duration) {
        let mark = self.state.to_move;
        self.state.board.set(mv.position, Square::Occupied(mark));
        self.state.history.push(mv.position);
        let think_ms = u64::try_from(think_time.as_millis()).unwrap_or(u64::MAX);
        let total = &mut self.state.think_time_ms[mark.index()];
        *total = total.saturating_add(think_ms);

        self.update_outcome();
        if self.state.in_progress() {
            self.state.to_move = mark.opponent();
        }
        debug!(%mark, outcome = ?self.state.outcome, "Mark placed");
    }

    fn is_ended(&self) -> bool {
        !self.state.in_progress()
    }

    fn is_error(&self) -> bool {
        false
    }

    fn winner(&self) -> Option<PlayerId> {
        self.state.winner().map(Mark::player)
    }

    fn full_state(&self) -> GameState {
        self.state.clone()
    }

    fn state_view(&self, state: &GameState, _viewer: Option<PlayerId>) -> GameState {
        state.clone()
    }

    fn move_time_limit(&self) -> Option<Duration> {
        self.config.move_time_limit()
    }

    #[instrument(skip(self), fields(mark = %self.state.to_move))]
    fn on_move_timeout(&mut self) -> bool {
        if !self.state.in_progress() {
            return false;
        }
        match *self.config.timeout_policy() {
            TimeoutPolicy::Forfeit => self.forfeit(),
            TimeoutPolicy::Skip => {
                debug!("Turn skipped on the clock");
                self.state.to_move = self.state.to_move.opponent();
            }
            TimeoutPolicy::Strike { max_strikes } => {
                let strikes = &mut self.state.strikes[self.state.to_move.index()];
                *strikes += 1;
                debug!(strikes = *strikes, max_strikes, "Strike recorded");
                if *strikes >= max_strikes {
                    self.forfeit();
                }
            }
        }
        true
    }
}

/// Builds [`TicTacToe`] games for a session directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicTacToeFactory;

impl RulesFactory for TicTacToeFactory {
    type Rules = TicTacToe;
    type Config = TicTacToeConfig;
    type Error = ConfigError;

    fn build(&self, config: TicTacToeConfig) -> Result<TicTacToe, ConfigError> {
        config.validate()?;
        Ok(TicTacToe::new(config))
    }
}
