//! Strictly Session - game-agnostic multiplayer session engine.
//!
//! Given an injected rules module, a session manages one match: player
//! registration and tokens, connection tracking, turn-taking with a move
//! clock, and an event history that can be replayed per viewer.
//!
//! # Architecture
//!
//! - **Timer**: cancellable single-shot turn clock ([`TurnTimer`])
//! - **History**: coalescing transcript with per-viewer replay ([`HistoryLog`])
//! - **Events**: typed per-session publish/subscribe ([`EventBus`])
//! - **Session**: the state machine tying them together ([`GameSession`])
//! - **Directory**: creates and looks up sessions ([`SessionDirectory`])
//!
//! # Example
//!
//! ```no_run
//! use strictly_session::{EngineConfig, GameRules, GameSession, SessionId};
//!
//! # fn example<R: GameRules>(rules: R) -> Result<(), strictly_session::SessionError> {
//! let session = GameSession::new(SessionId::generate(), rules, &EngineConfig::default())?;
//! let alice = session.register_new_player(None)?;
//! let bob = session.register_new_player(None)?;
//! session.connect(alice.player)?;
//! session.connect(bob.player)?;
//! assert!(session.has_started());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod directory;
mod error;
mod events;
mod history;
mod player;
mod rules;
mod session;
mod summary;
mod timer;

// Crate-level exports - Configuration
pub use config::{EngineConfig, MIN_TOKEN_LENGTH};

// Crate-level exports - Errors
pub use error::{ConfigError, SessionError, SessionErrorKind};

// Crate-level exports - Players
pub use player::{PlayerId, PlayerToken, Registration};

// Crate-level exports - Rules contract
pub use rules::{GameRules, RulesFactory};

// Crate-level exports - Session core
pub use directory::SessionDirectory;
pub use events::{EventBus, EventKind, Listener, SessionEvent, SubscriptionId};
pub use history::{HistoryEntry, HistoryLog, ReplayEntry};
pub use session::{EventOf, GameSession, ReplayOf, SessionId};
pub use summary::{SessionPhase, SessionStatus, SessionSummary};
pub use timer::{TimerGeneration, TurnTimer};
