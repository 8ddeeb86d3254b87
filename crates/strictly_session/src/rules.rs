//! The contract an injected game-logic module fulfils.
//!
//! The session engine never looks inside a game. Everything it needs to
//! know (whose turn it is, whether a move is legal, what a given viewer
//! may see) is asked of a [`GameRules`] implementation it owns for the
//! lifetime of the session.

use crate::player::PlayerId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display};
use std::time::Duration;

/// Game logic driven by a session.
///
/// Every query must be deterministic for a given internal state. The
/// session serializes all calls, so implementations need no locking.
pub trait GameRules: Send + 'static {
    /// Parameters the game was created with, shown in session summaries.
    type Params: Serialize + Clone + Debug + Send + 'static;
    /// A move payload as submitted by a player.
    type Move: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static;
    /// The authoritative full state.
    ///
    /// `Clone` must produce an independent structural copy. The history
    /// log keeps these copies while the rules module keeps mutating its own.
    type State: Serialize + Clone + Debug + Send + Sync + 'static;
    /// What one viewer is allowed to see of a full state.
    type View: Serialize + Clone + Debug + Send + 'static;

    /// Number of player slots the game needs before it can start.
    fn player_count(&self) -> usize;

    /// The game's creation parameters.
    fn params(&self) -> Self::Params;

    /// The player expected to move next, if any.
    fn next_player(&self) -> Option<PlayerId>;

    /// Whether `player` may make `mv` in the current state.
    fn is_valid_move(&self, player: PlayerId, mv: &Self::Move) -> bool;

    /// Applies a move already checked with [`GameRules::is_valid_move`].
    ///
    /// `think_time` is how long the turn clock ran before the move arrived.
    fn apply_move(&mut self, player: PlayerId, mv: &Self::Move, think_time: Duration);

    /// Whether the game is over.
    fn is_ended(&self) -> bool;

    /// Whether the game ended because of an internal failure.
    fn is_error(&self) -> bool;

    /// The winner once the game is over; `None` for a draw.
    fn winner(&self) -> Option<PlayerId>;

    /// A copy of the authoritative state.
    fn full_state(&self) -> Self::State;

    /// Projects `state` for `viewer`. `None` is a spectator.
    fn state_view(&self, state: &Self::State, viewer: Option<PlayerId>) -> Self::View;

    /// Time budget for the current player's move, or `None` for no clock.
    fn move_time_limit(&self) -> Option<Duration>;

    /// Applies whatever the game does when the current player runs out of
    /// time. Returns `true` if the state changed.
    fn on_move_timeout(&mut self) -> bool;
}

/// Builds rules modules from a game configuration.
///
/// The session directory owns a factory and asks it for a fresh rules
/// module every time a session is created.
pub trait RulesFactory: Send + Sync + 'static {
    /// The rules module this factory builds.
    type Rules: GameRules;
    /// Per-game configuration accepted by [`RulesFactory::build`].
    type Config: Debug;
    /// Why a configuration was refused.
    type Error: Display;

    /// Builds a rules module, or explains why the configuration is refused.
    fn build(&self, config: Self::Config) -> Result<Self::Rules, Self::Error>;
}
