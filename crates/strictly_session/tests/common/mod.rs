//! Scripted card-shedding rules module used by the integration tests.
//!
//! Each player holds a private hand and plays one card per turn onto a
//! public pile. Emptying your hand wins. Hands of other players are hidden
//! in player views; spectators see everything.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strictly_session::{
    ConfigError, EventKind, EventOf, GameRules, GameSession, PlayerId, RulesFactory,
};

/// What happens when the player on the clock runs out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutBehavior {
    /// Nothing changes.
    NoChange,
    /// A strike is recorded; the same player stays on the clock.
    Strike,
    /// The turn passes to the next player.
    Skip,
    /// The rules module fails.
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandMove {
    pub card: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandState {
    pub hands: BTreeMap<PlayerId, Vec<u32>>,
    pub pile: Vec<u32>,
    pub to_move: PlayerId,
    pub strikes: BTreeMap<PlayerId, u32>,
    /// Turns passed by the clock.
    pub skips: u32,
    pub think_times_ms: Vec<u64>,
    pub ended: bool,
    pub error: bool,
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandView {
    /// `None` where the viewer may not see the hand.
    pub hands: BTreeMap<PlayerId, Option<Vec<u32>>>,
    pub pile: Vec<u32>,
    pub to_move: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandParams {
    pub players: usize,
}

#[derive(Debug)]
pub struct HandRules {
    state: HandState,
    time_limit: Option<Duration>,
    timeout: TimeoutBehavior,
    error_card: Option<u32>,
}

pub fn p(slot: u32) -> PlayerId {
    PlayerId::new(slot)
}

impl HandRules {
    pub fn new(hands: Vec<Vec<u32>>) -> Self {
        let hands: BTreeMap<_, _> = hands
            .into_iter()
            .enumerate()
            .map(|(i, hand)| (p(i as u32 + 1), hand))
            .collect();
        let strikes = hands.keys().map(|&player| (player, 0)).collect();
        Self {
            state: HandState {
                hands,
                pile: Vec::new(),
                to_move: p(1),
                strikes,
                skips: 0,
                think_times_ms: Vec::new(),
                ended: false,
                error: false,
                winner: None,
            },
            time_limit: None,
            timeout: TimeoutBehavior::NoChange,
            error_card: None,
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutBehavior) -> Self {
        self.timeout = timeout;
        self
    }

    /// Playing this card ends the game with the error flag set.
    pub fn with_error_card(mut self, card: u32) -> Self {
        self.error_card = Some(card);
        self
    }

    fn rotate(&mut self) {
        let count = self.state.hands.len() as u32;
        self.state.to_move = p(self.state.to_move.get() % count + 1);
    }
}

impl GameRules for HandRules {
    type Params = HandParams;
    type Move = HandMove;
    type State = HandState;
    type View = HandView;

    fn player_count(&self) -> usize {
        self.state.hands.len()
    }

    fn params(&self) -> HandParams {
        HandParams {
            players: self.state.hands.len(),
        }
    }

    fn next_player(&self) -> Option<PlayerId> {
        (!self.state.ended).then_some(self.state.to_move)
    }

    fn is_valid_move(&self, player: PlayerId, mv: &HandMove) -> bool {
        !self.state.ended
            && player == self.state.to_move
            && self
                .state
                .hands
                .get(&player)
                .is_some_and(|hand| hand.contains(&mv.card))
    }

    fn apply_move(&mut self, player: PlayerId, mv: &HandMove, think_time: Duration) {
        self.state
            .think_times_ms
            .push(u64::try_from(think_time.as_millis()).unwrap_or(u64::MAX));
        if let Some(hand) = self.state.hands.get_mut(&player) {
            hand.retain(|&card| card != mv.card);
            if hand.is_empty() {
                self.state.ended = true;
                self.state.winner = Some(player);
            }
        }
        self.state.pile.push(mv.card);
        if self.error_card == Some(mv.card) {
            self.state.ended = true;
            self.state.error = true;
        }
        if !self.state.ended {
            self.rotate();
        }
    }

    fn is_ended(&self) -> bool {
        self.state.ended
    }

    fn is_error(&self) -> bool {
        self.state.error
    }

    fn winner(&self) -> Option<PlayerId> {
        self.state.winner
    }

    fn full_state(&self) -> HandState {
        self.state.clone()
    }

    fn state_view(&self, state: &HandState, viewer: Option<PlayerId>) -> HandView {
        let hands = state
            .hands
            .iter()
            .map(|(&player, hand)| {
                let visible = viewer.is_none_or(|viewer| viewer == player);
                (player, visible.then(|| hand.clone()))
            })
            .collect();
        HandView {
            hands,
            pile: state.pile.clone(),
            to_move: state.to_move,
        }
    }

    fn move_time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    fn on_move_timeout(&mut self) -> bool {
        match self.timeout {
            TimeoutBehavior::NoChange => false,
            TimeoutBehavior::Strike => {
                *self.state.strikes.entry(self.state.to_move).or_default() += 1;
                true
            }
            TimeoutBehavior::Skip => {
                self.state.skips += 1;
                self.rotate();
                true
            }
            TimeoutBehavior::Panic => panic!("rules module failed during timeout"),
        }
    }
}

/// Builds [`HandRules`] from a list of hands.
#[derive(Debug, Default)]
pub struct HandFactory {
    pub time_limit: Option<Duration>,
    /// Panic instead of building, as a broken factory would.
    pub panic_on_build: bool,
}

impl RulesFactory for HandFactory {
    type Rules = HandRules;
    type Config = Vec<Vec<u32>>;
    type Error = ConfigError;

    fn build(&self, hands: Vec<Vec<u32>>) -> Result<HandRules, ConfigError> {
        if self.panic_on_build {
            panic!("factory failed while building");
        }
        if hands.len() < 2 {
            return Err(ConfigError::new(format!(
                "need at least 2 hands, got {}",
                hands.len()
            )));
        }
        let rules = HandRules::new(hands);
        Ok(match self.time_limit {
            Some(limit) => rules.with_time_limit(limit),
            None => rules,
        })
    }
}

/// Shared buffer of every event a session published.
pub type EventLog = Arc<Mutex<Vec<EventOf<HandRules>>>>;

/// Subscribes a recorder for every event kind.
pub fn record_events(session: &GameSession<HandRules>) -> EventLog {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    session
        .subscribe_all(move |event| sink.lock().expect("event log").push(event.clone()))
        .expect("subscribe");
    log
}

/// Kinds of the recorded events, in order.
pub fn kinds(log: &EventLog) -> Vec<EventKind> {
    log.lock()
        .expect("event log")
        .iter()
        .map(|event| event.kind())
        .collect()
}

/// Takes and clears the recorded events.
pub fn drain(log: &EventLog) -> Vec<EventOf<HandRules>> {
    std::mem::take(&mut *log.lock().expect("event log"))
}

/// Lets spawned timer tasks run after the clock moved.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
