//! Per-session typed publish/subscribe.

use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace};

/// The five kinds of session event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    /// The game started.
    Start,
    /// The visible state changed while the game is running.
    StateChange,
    /// A move was applied.
    Move,
    /// The session is waiting on one player's move.
    WaitingForMove,
    /// The game is over.
    End,
}

/// An event published by a session.
///
/// `S` is the rules module's full state, `M` its move payload. States are
/// unfiltered; listeners that forward to players project them first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent<S, M> {
    /// Every player connected and the game began.
    Start {
        /// State at the start.
        state: S,
    },
    /// The state changed and the game continues.
    StateChange {
        /// The new state.
        state: S,
    },
    /// A move was applied.
    Move {
        /// Who moved.
        player: PlayerId,
        /// The move payload.
        #[serde(rename = "move")]
        mv: M,
    },
    /// The session now waits for this player.
    WaitingForMove {
        /// The player on the clock.
        next_player: PlayerId,
    },
    /// The game ended.
    End {
        /// Final state.
        state: S,
    },
}

impl<S, M> SessionEvent<S, M> {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::StateChange { .. } => EventKind::StateChange,
            Self::Move { .. } => EventKind::Move,
            Self::WaitingForMove { .. } => EventKind::WaitingForMove,
            Self::End { .. } => EventKind::End,
        }
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("subscription#{_0}")]
pub struct SubscriptionId(u64);

/// A synchronous event listener.
pub type Listener<S, M> = Arc<dyn Fn(&SessionEvent<S, M>) + Send + Sync>;

enum Sink<S, M> {
    Callback(Listener<S, M>),
    Channel(mpsc::UnboundedSender<SessionEvent<S, M>>),
}

struct Subscription<S, M> {
    id: SubscriptionId,
    kind: EventKind,
    sink: Sink<S, M>,
}

/// Delivers session events to listeners in subscription order.
///
/// Delivery is synchronous: `publish` returns after every listener ran.
pub struct EventBus<S, M> {
    subscriptions: Vec<Subscription<S, M>>,
    next_id: u64,
}

impl<S, M> std::fmt::Debug for EventBus<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<S, M> EventBus<S, M>
where
    S: Clone,
    M: Clone,
{
    /// Creates a bus with no listeners.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers `listener` for events of `kind`.
    #[instrument(skip(self, listener))]
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent<S, M>) + Send + Sync + 'static,
    {
        self.push(kind, Sink::Callback(Arc::new(listener)))
    }

    /// Registers one listener for every event kind.
    ///
    /// Returns one subscription per kind.
    pub fn subscribe_all<F>(&mut self, listener: F) -> Vec<SubscriptionId>
    where
        F: Fn(&SessionEvent<S, M>) + Send + Sync + 'static,
    {
        let listener: Listener<S, M> = Arc::new(listener);
        EventKind::iter()
            .map(|kind| self.push(kind, Sink::Callback(Arc::clone(&listener))))
            .collect()
    }

    /// Forwards events of the given kinds into a channel.
    ///
    /// The channel is dropped from the bus on the first publish after its
    /// receiver closes.
    #[instrument(skip(self))]
    pub fn channel(&mut self, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<SessionEvent<S, M>> {
        let (tx, rx) = mpsc::unbounded_channel();
        for &kind in kinds {
            self.push(kind, Sink::Channel(tx.clone()));
        }
        rx
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        before != self.subscriptions.len()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Delivers `event` to every subscriber of its kind.
    pub fn publish(&mut self, event: &SessionEvent<S, M>) {
        let kind = event.kind();
        let mut closed = Vec::new();
        let mut delivered = 0usize;

        for sub in self.subscriptions.iter().filter(|sub| sub.kind == kind) {
            match &sub.sink {
                Sink::Callback(listener) => listener(event),
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(sub.id);
                        continue;
                    }
                }
            }
            delivered += 1;
        }

        if !closed.is_empty() {
            debug!(count = closed.len(), "Dropping closed event channels");
            self.subscriptions.retain(|sub| !closed.contains(&sub.id));
        }
        trace!(%kind, delivered, "Published event");
    }

    fn push(&mut self, kind: EventKind, sink: Sink<S, M>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription { id, kind, sink });
        id
    }
}

impl<S: Clone, M: Clone> Default for EventBus<S, M> {
    fn default() -> Self {
        Self::new()
    }
}
