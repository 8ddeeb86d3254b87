//! Player slots, secret tokens and the per-session registration store.

use crate::error::{SessionError, SessionErrorKind};
use derive_more::{Display, From};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

/// Draws allowed before registration gives up on finding an unused token.
const MAX_TOKEN_ATTEMPTS: usize = 64;

/// A player slot in a game, numbered from 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Creates a player identifier from its slot number.
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// Returns the slot number.
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// The secret credential handed to a player at registration.
///
/// Tokens are fixed-length random alphanumeric strings. They are never
/// reassigned; holding one is the only proof of being that player.
#[derive(Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerToken(String);

impl PlayerToken {
    /// Generates a fresh random token of `len` characters.
    pub fn generate(len: usize) -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlayerToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for PlayerToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

// Tokens are secrets; keep them out of logs.
impl std::fmt::Debug for PlayerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PlayerToken(<{} chars>)", self.0.len())
    }
}

/// The result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// The slot assigned to the player.
    pub player: PlayerId,
    /// The secret the player must present on later requests.
    pub token: PlayerToken,
}

/// Connection bookkeeping for one registered slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConnectionState {
    has_connected_once: bool,
}

/// Registered slots, their tokens and whether each has connected.
#[derive(Debug)]
pub(crate) struct PlayerRegistry {
    player_count: usize,
    token_length: usize,
    tokens: HashMap<PlayerToken, PlayerId>,
    players: BTreeMap<PlayerId, ConnectionState>,
    connected: usize,
}

impl PlayerRegistry {
    pub(crate) fn new(player_count: usize, token_length: usize) -> Self {
        Self {
            player_count,
            token_length,
            tokens: HashMap::new(),
            players: BTreeMap::new(),
            connected: 0,
        }
    }

    pub(crate) fn registered_count(&self) -> usize {
        self.players.len()
    }

    pub(crate) fn connected_count(&self) -> usize {
        self.connected
    }

    pub(crate) fn is_registered(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    pub(crate) fn has_connected(&self, player: PlayerId) -> bool {
        self.players
            .get(&player)
            .is_some_and(|state| state.has_connected_once)
    }

    /// Registers a slot, either the requested one or the lowest free one.
    #[instrument(skip(self))]
    pub(crate) fn register(
        &mut self,
        requested: Option<PlayerId>,
    ) -> Result<Registration, SessionError> {
        if let Some(slot) = requested {
            if slot.get() == 0 || slot.get() as usize > self.player_count {
                warn!(%slot, player_count = self.player_count, "Requested slot out of range");
                return Err(SessionError::new(SessionErrorKind::InvalidSlot(slot)));
            }
            if self.players.contains_key(&slot) {
                warn!(%slot, "Requested slot already registered");
                return Err(SessionError::new(SessionErrorKind::SlotTaken(slot)));
            }
        }

        if self.players.len() >= self.player_count {
            warn!(player_count = self.player_count, "Registration refused, room full");
            return Err(SessionError::new(SessionErrorKind::RoomFull));
        }

        let player = match requested {
            Some(slot) => slot,
            None => self.lowest_free_slot(),
        };

        let token = self.fresh_token()?;
        self.tokens.insert(token.clone(), player);
        self.players.insert(player, ConnectionState::default());

        info!(%player, registered = self.players.len(), "Player registered");
        Ok(Registration { player, token })
    }

    pub(crate) fn resolve(&self, token: &PlayerToken) -> Result<PlayerId, SessionError> {
        self.tokens.get(token).copied().ok_or_else(|| {
            debug!("Token lookup failed");
            SessionError::new(SessionErrorKind::UnknownToken)
        })
    }

    /// Marks a player connected. Returns `false` if it had connected before.
    pub(crate) fn mark_connected(&mut self, player: PlayerId) -> Result<bool, SessionError> {
        let state = self
            .players
            .get_mut(&player)
            .ok_or_else(|| SessionError::new(SessionErrorKind::UnknownPlayer(player)))?;

        if state.has_connected_once {
            return Ok(false);
        }

        state.has_connected_once = true;
        self.connected += 1;
        Ok(true)
    }

    fn lowest_free_slot(&self) -> PlayerId {
        (1..)
            .map(PlayerId::new)
            .find(|slot| !self.players.contains_key(slot))
            .unwrap_or(PlayerId::new(1))
    }

    fn fresh_token(&self) -> Result<PlayerToken, SessionError> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = PlayerToken::generate(self.token_length);
            if !self.tokens.contains_key(&token) {
                return Ok(token);
            }
        }
        warn!(
            token_length = self.token_length,
            attempts = MAX_TOKEN_ATTEMPTS,
            "Every generated token collided"
        );
        Err(SessionError::new(SessionErrorKind::TokenSpaceExhausted))
    }
}
