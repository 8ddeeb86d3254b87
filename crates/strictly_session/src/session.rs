//! The game session state machine.
//!
//! A [`GameSession`] owns one rules module, its turn clock, history and
//! event bus behind a single lock. Every mutation (registration, connect,
//! move, timer fire) takes that lock, so rule evaluation, state mutation
//! and event emission always observe a consistent pre-state.

use crate::config::EngineConfig;
use crate::error::{SessionError, SessionErrorKind};
use crate::events::{EventBus, EventKind, SessionEvent, SubscriptionId};
use crate::history::{HistoryLog, ReplayEntry};
use crate::player::{PlayerId, PlayerRegistry, PlayerToken, Registration};
use crate::rules::GameRules;
use crate::summary::{SessionPhase, SessionStatus, SessionSummary, StatusCell};
use crate::timer::{TimerGeneration, TurnTimer};
use derive_more::{Display, From};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Length of generated session identifiers.
const SESSION_ID_LENGTH: usize = 12;

/// Opaque identifier of a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a random identifier.
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LENGTH)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Event type published by a session driven by `R`.
pub type EventOf<R> = SessionEvent<<R as GameRules>::State, <R as GameRules>::Move>;

/// Replay entry type produced by a session driven by `R`.
pub type ReplayOf<R> = ReplayEntry<<R as GameRules>::View, <R as GameRules>::Move>;

struct Core<R: GameRules> {
    rules: R,
    players: PlayerRegistry,
    timer: TurnTimer,
    history: HistoryLog<R::State, R::Move>,
    bus: EventBus<R::State, R::Move>,
}

struct Shared<R: GameRules> {
    id: SessionId,
    player_count: usize,
    status: StatusCell,
    core: Mutex<Core<R>>,
}

/// One multiplayer match.
///
/// Cloning yields another handle to the same session. Event listeners run
/// while the session lock is held: they may read [`GameSession::status`]
/// but must not call any other session method.
pub struct GameSession<R: GameRules> {
    shared: Arc<Shared<R>>,
}

impl<R: GameRules> Clone for GameSession<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: GameRules> std::fmt::Debug for GameSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .field("player_count", &self.shared.player_count)
            .finish()
    }
}

impl<R: GameRules> GameSession<R> {
    /// Creates a session whose turn clock runs on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionErrorKind::InvalidConfig`] if `config` fails
    /// validation and [`SessionErrorKind::RuntimeUnavailable`] outside a
    /// runtime.
    #[track_caller]
    pub fn new(id: SessionId, rules: R, config: &EngineConfig) -> Result<Self, SessionError> {
        let timer = TurnTimer::try_current()?;
        Self::with_timer(id, rules, config, timer)
    }

    /// Creates a session whose turn clock runs on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionErrorKind::InvalidConfig`] if `config` fails validation.
    pub fn with_runtime(
        id: SessionId,
        rules: R,
        config: &EngineConfig,
        runtime: Handle,
    ) -> Result<Self, SessionError> {
        Self::with_timer(id, rules, config, TurnTimer::new(runtime))
    }

    #[instrument(skip(rules, config, timer), fields(session_id = %id))]
    fn with_timer(
        id: SessionId,
        rules: R,
        config: &EngineConfig,
        timer: TurnTimer,
    ) -> Result<Self, SessionError> {
        config.validate().map_err(|e| {
            warn!(error = %e, "Refusing to create session");
            SessionError::new(SessionErrorKind::InvalidConfig(e.message))
        })?;
        let player_count = rules.player_count();
        info!(player_count, "Creating game session");
        Ok(Self {
            shared: Arc::new(Shared {
                id,
                player_count,
                status: StatusCell::new(),
                core: Mutex::new(Core {
                    rules,
                    players: PlayerRegistry::new(player_count, *config.token_length()),
                    timer,
                    history: HistoryLog::new(),
                    bus: EventBus::new(),
                }),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Core<R>>, SessionError> {
        self.shared.core.lock().map_err(|_| {
            error!(session_id = %self.shared.id, "Session lock poisoned");
            SessionError::new(SessionErrorKind::Poisoned)
        })
    }

    /// The session identifier.
    pub fn id(&self) -> &SessionId {
        &self.shared.id
    }

    /// Current lifecycle status. Never blocks.
    pub fn status(&self) -> SessionStatus {
        self.shared.status.get()
    }

    /// Whether the game has started (it may also have ended since).
    pub fn has_started(&self) -> bool {
        self.status() != SessionStatus::NotStarted
    }

    /// Whether the game is over.
    pub fn is_ended(&self) -> bool {
        self.status().is_terminal()
    }

    /// Number of players the game needs.
    pub fn player_count(&self) -> usize {
        self.shared.player_count
    }

    // ─────────────────────────────────────────────────────────────
    //  Registration and connection
    // ─────────────────────────────────────────────────────────────

    /// Registers a player, in `requested` slot or the lowest free one.
    ///
    /// # Errors
    ///
    /// [`SessionErrorKind::SlotTaken`], [`SessionErrorKind::InvalidSlot`]
    /// or [`SessionErrorKind::RoomFull`].
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub fn register_new_player(
        &self,
        requested: Option<PlayerId>,
    ) -> Result<Registration, SessionError> {
        let mut core = self.lock()?;
        core.players.register(requested)
    }

    /// Looks up the player a token was issued to.
    pub fn resolve_token(&self, token: &PlayerToken) -> Result<PlayerId, SessionError> {
        self.lock()?.players.resolve(token)
    }

    /// Marks `player` connected. Repeated connects are silent no-ops.
    ///
    /// The connect that brings every player online starts the game.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub fn connect(&self, player: PlayerId) -> Result<(), SessionError> {
        let mut core = self.lock()?;
        if !core.players.mark_connected(player)? {
            debug!(%player, "Player already connected");
            return Ok(());
        }

        let connected = core.players.connected_count();
        info!(%player, connected, "Player connected");

        if connected == self.shared.player_count && self.shared.status.advance(SessionStatus::Started)
        {
            info!("All players connected, game started");
            let state = core.rules.full_state();
            core.bus.publish(&SessionEvent::Start { state });
            // `start` already announces the initial state.
            self.settle(&mut core, false, true);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    //  Moves and the turn clock
    // ─────────────────────────────────────────────────────────────

    /// Applies a move for `player`.
    ///
    /// # Errors
    ///
    /// [`SessionErrorKind::GameNotStarted`] unless the game is running,
    /// [`SessionErrorKind::UnknownPlayer`] for an unregistered slot and
    /// [`SessionErrorKind::IllegalMove`] if the rules module refuses it.
    #[instrument(skip(self, mv), fields(session_id = %self.shared.id))]
    pub fn make_move(&self, player: PlayerId, mv: R::Move) -> Result<(), SessionError> {
        let mut core = self.lock()?;
        if self.status() != SessionStatus::Started {
            warn!(%player, status = %self.status(), "Move outside a running game");
            return Err(SessionError::new(SessionErrorKind::GameNotStarted));
        }
        if !core.players.is_registered(player) {
            warn!(%player, "Move from unregistered player");
            return Err(SessionError::new(SessionErrorKind::UnknownPlayer(player)));
        }
        if !core.rules.is_valid_move(player, &mv) {
            warn!(%player, ?mv, "Illegal move rejected");
            return Err(SessionError::new(SessionErrorKind::IllegalMove));
        }

        let think_time = core.timer.stop();
        core.rules.apply_move(player, &mv, think_time);
        let think_ms = u64::try_from(think_time.as_millis()).unwrap_or(u64::MAX);
        debug!(%player, think_ms, "Move applied");

        core.history.record_move(player, mv.clone());
        core.bus.publish(&SessionEvent::Move { player, mv });
        self.settle(&mut core, true, true);
        Ok(())
    }

    /// Handles the turn clock running out.
    ///
    /// A fire from a superseded clock start is ignored. If the rules module
    /// reports no change, the clock is left expired and is not restarted.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    fn on_timer_fire(&self, generation: TimerGeneration) -> Result<(), SessionError> {
        let mut core = self.lock()?;
        if self.status() != SessionStatus::Started || !core.timer.mark_fired(generation) {
            debug!("Ignoring stale turn timer fire");
            return Ok(());
        }

        let timed_out = core.rules.next_player();
        if !core.rules.on_move_timeout() {
            debug!(player = ?timed_out, "Move timeout changed nothing");
            return Ok(());
        }

        let next = core.rules.next_player();
        info!(timed_out = ?timed_out, next = ?next, "Move timeout applied");
        self.settle(&mut core, true, next != timed_out);
        Ok(())
    }

    /// Bookkeeping shared by every state-changing path.
    fn settle(&self, core: &mut Core<R>, emit_state_change: bool, emit_waiting: bool) {
        let state = core.rules.full_state();
        core.history.record_transition(state.clone());

        if core.rules.is_ended() {
            core.timer.stop();
            let terminal = if core.rules.is_error() {
                SessionStatus::Error
            } else {
                SessionStatus::Ended
            };
            self.shared.status.advance(terminal);
            info!(status = %terminal, winner = ?core.rules.winner(), "Game ended");
            core.bus.publish(&SessionEvent::End { state });
            return;
        }

        if emit_state_change {
            core.bus.publish(&SessionEvent::StateChange { state });
        }
        if emit_waiting && let Some(next_player) = core.rules.next_player() {
            core.bus.publish(&SessionEvent::WaitingForMove { next_player });
        }
        self.restart_timer(core);
    }

    fn restart_timer(&self, core: &mut Core<R>) {
        let Some(limit) = core.rules.move_time_limit() else {
            core.timer.start_untimed();
            return;
        };

        let session: Weak<Shared<R>> = Arc::downgrade(&self.shared);
        core.timer.start(limit, move |generation| {
            let Some(shared) = session.upgrade() else {
                return;
            };
            let session = GameSession { shared };
            if let Err(e) = session.on_timer_fire(generation) {
                error!(session_id = %session.shared.id, error = %e, "Turn timer fire failed");
            }
        });
    }

    // ─────────────────────────────────────────────────────────────
    //  Subscriptions
    // ─────────────────────────────────────────────────────────────

    /// Registers a listener for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> Result<SubscriptionId, SessionError>
    where
        F: Fn(&EventOf<R>) + Send + Sync + 'static,
    {
        Ok(self.lock()?.bus.subscribe(kind, listener))
    }

    /// Registers a listener for every event kind.
    pub fn subscribe_all<F>(&self, listener: F) -> Result<Vec<SubscriptionId>, SessionError>
    where
        F: Fn(&EventOf<R>) + Send + Sync + 'static,
    {
        Ok(self.lock()?.bus.subscribe_all(listener))
    }

    /// Opens a channel receiving events of the given kinds.
    pub fn events(
        &self,
        kinds: &[EventKind],
    ) -> Result<mpsc::UnboundedReceiver<EventOf<R>>, SessionError> {
        Ok(self.lock()?.bus.channel(kinds))
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, SessionError> {
        Ok(self.lock()?.bus.unsubscribe(id))
    }

    // ─────────────────────────────────────────────────────────────
    //  Reads
    // ─────────────────────────────────────────────────────────────

    /// The authoritative, unfiltered state.
    pub fn full_state(&self) -> Result<R::State, SessionError> {
        Ok(self.lock()?.rules.full_state())
    }

    /// The current state as `viewer` may see it.
    pub fn state_view(&self, viewer: Option<PlayerId>) -> Result<R::View, SessionError> {
        let core = self.lock()?;
        let state = core.rules.full_state();
        Ok(core.rules.state_view(&state, viewer))
    }

    /// The player on the clock; `None` unless the game is running.
    pub fn next_player(&self) -> Result<Option<PlayerId>, SessionError> {
        let core = self.lock()?;
        if self.status() != SessionStatus::Started {
            return Ok(None);
        }
        Ok(core.rules.next_player())
    }

    /// The winner; `None` until the game is over, and for a draw.
    pub fn winner(&self) -> Result<Option<PlayerId>, SessionError> {
        let core = self.lock()?;
        if !self.is_ended() {
            return Ok(None);
        }
        Ok(core.rules.winner())
    }

    /// Number of registered players.
    pub fn registered_count(&self) -> Result<usize, SessionError> {
        Ok(self.lock()?.players.registered_count())
    }

    /// Number of players that have connected at least once.
    pub fn connected_count(&self) -> Result<usize, SessionError> {
        Ok(self.lock()?.players.connected_count())
    }

    /// Whether `player` has connected at least once.
    pub fn has_connected(&self, player: PlayerId) -> Result<bool, SessionError> {
        Ok(self.lock()?.players.has_connected(player))
    }

    /// The committed history, with every snapshot projected for `viewer`.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub fn replay(&self, viewer: Option<PlayerId>) -> Result<Vec<ReplayOf<R>>, SessionError> {
        let core = self.lock()?;
        let rules = &core.rules;
        let entries = core
            .history
            .replay(|state| rules.state_view(state, viewer));
        debug!(entries = entries.len(), "Replayed history");
        Ok(entries)
    }

    /// Summary for listings.
    pub fn summary(&self) -> Result<SessionSummary<R::Params>, SessionError> {
        let core = self.lock()?;
        let phase = match self.status() {
            SessionStatus::NotStarted => SessionPhase::NotStarted,
            SessionStatus::Started => SessionPhase::Started {
                next_player: core.rules.next_player(),
            },
            SessionStatus::Ended => SessionPhase::Ended {
                winner: core.rules.winner(),
            },
            SessionStatus::Error => SessionPhase::Error {
                winner: core.rules.winner(),
            },
        };
        Ok(SessionSummary {
            session_id: self.shared.id.clone(),
            params: core.rules.params(),
            connected_players: core.players.connected_count(),
            total_players: self.shared.player_count,
            phase,
        })
    }
}
