//! Creates and looks up sessions by identifier.

use crate::config::EngineConfig;
use crate::error::{SessionError, SessionErrorKind};
use crate::rules::{GameRules, RulesFactory};
use crate::session::{GameSession, SessionId};
use crate::summary::SessionSummary;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, warn};

type SummaryOf<F> = SessionSummary<<<F as RulesFactory>::Rules as GameRules>::Params>;

/// Registry of live sessions built by one rules factory.
///
/// Sessions are fully independent; the directory lock only guards the
/// map, never a session's own state.
#[derive(Debug)]
pub struct SessionDirectory<F: RulesFactory> {
    factory: F,
    config: EngineConfig,
    runtime: Option<Handle>,
    sessions: RwLock<HashMap<SessionId, GameSession<F::Rules>>>,
}

impl<F: RulesFactory> SessionDirectory<F> {
    /// Creates a directory whose sessions use the ambient tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionErrorKind::InvalidConfig`] if `config` fails validation.
    #[instrument(skip(factory))]
    pub fn new(factory: F, config: EngineConfig) -> Result<Self, SessionError> {
        config.validate().map_err(|e| {
            warn!(error = %e, "Refusing to create session directory");
            SessionError::new(SessionErrorKind::InvalidConfig(e.message))
        })?;
        info!("Creating session directory");
        Ok(Self {
            factory,
            config,
            runtime: None,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a directory whose sessions run their clocks on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionErrorKind::InvalidConfig`] if `config` fails validation.
    pub fn with_runtime(
        factory: F,
        config: EngineConfig,
        runtime: Handle,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            runtime: Some(runtime),
            ..Self::new(factory, config)?
        })
    }

    /// The engine configuration sessions are created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn read(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<SessionId, GameSession<F::Rules>>>, SessionError> {
        self.sessions
            .read()
            .map_err(|_| {
                error!("Session directory lock poisoned");
                SessionError::new(SessionErrorKind::Poisoned)
            })
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, GameSession<F::Rules>>>, SessionError> {
        self.sessions
            .write()
            .map_err(|_| {
                error!("Session directory lock poisoned");
                SessionError::new(SessionErrorKind::Poisoned)
            })
    }

    /// Builds a rules module from `config` and opens a session for it.
    ///
    /// # Errors
    ///
    /// [`SessionErrorKind::DirectoryFull`] at capacity,
    /// [`SessionErrorKind::RulesRejected`] if the factory refuses the
    /// configuration and [`SessionErrorKind::RuntimeUnavailable`] when no
    /// runtime can drive the turn clock.
    #[instrument(skip(self))]
    pub fn create(&self, config: F::Config) -> Result<SessionId, SessionError> {
        let mut sessions = self.write()?;

        if let Some(max) = *self.config.max_sessions()
            && sessions.len() >= max
        {
            warn!(max, "Session directory full");
            return Err(SessionError::new(SessionErrorKind::DirectoryFull(max)));
        }

        let rules = self.factory.build(config).map_err(|reason| {
            warn!(%reason, "Rules factory rejected configuration");
            SessionError::new(SessionErrorKind::RulesRejected(reason.to_string()))
        })?;

        let id = loop {
            let candidate = SessionId::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = match &self.runtime {
            Some(runtime) => {
                GameSession::with_runtime(id.clone(), rules, &self.config, runtime.clone())?
            }
            None => GameSession::new(id.clone(), rules, &self.config)?,
        };
        sessions.insert(id.clone(), session);

        info!(session_id = %id, live = sessions.len(), "Session created");
        Ok(id)
    }

    /// Looks up a session. `Ok(None)` means no session has that identifier.
    ///
    /// # Errors
    ///
    /// [`SessionErrorKind::Poisoned`] if a panic left the directory map
    /// unusable.
    pub fn lookup(&self, id: &SessionId) -> Result<Option<GameSession<F::Rules>>, SessionError> {
        let session = self.read()?.get(id).cloned();
        if session.is_none() {
            debug!(session_id = %id, "Session not found");
        }
        Ok(session)
    }

    /// Removes a session, returning it if it existed.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &SessionId) -> Result<Option<GameSession<F::Rules>>, SessionError> {
        let removed = self.write()?.remove(id);
        if removed.is_some() {
            info!(session_id = %id, "Session removed");
        }
        Ok(removed)
    }

    /// Lists live session identifiers in sorted order.
    pub fn list_sessions(&self) -> Result<Vec<SessionId>, SessionError> {
        let mut ids: Vec<_> = self.read()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Summaries of every live session, ordered by identifier.
    pub fn summaries(&self) -> Result<Vec<SummaryOf<F>>, SessionError> {
        let mut sessions: Vec<_> = self.read()?.values().cloned().collect();
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions.iter().map(GameSession::summary).collect()
    }

    /// Drops every session whose game is over. Returns how many went.
    #[instrument(skip(self))]
    pub fn prune_finished(&self) -> Result<usize, SessionError> {
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_ended());
        let pruned = before - sessions.len();
        info!(pruned, live = sessions.len(), "Pruned finished sessions");
        Ok(pruned)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.read().map(|sessions| sessions.len()).unwrap_or(0)
    }

    /// Whether the directory holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
