//! Replayable transcript of a session.
//!
//! The log stores full states, never views, so the same transcript can be
//! filtered differently for every requester at read time. Consecutive state
//! changes with no move between them collapse into one pending snapshot,
//! which is committed only when the next move is recorded.

use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

/// A committed history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry<S, M> {
    /// The full state as it stood before the move that follows it.
    StateSnapshot(S),
    /// A move that was applied.
    MoveRecord {
        /// Who moved.
        player: PlayerId,
        /// The move payload.
        mv: M,
    },
}

/// A history entry as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplayEntry<V, M> {
    /// A state projected for the viewer.
    State {
        /// The projected state.
        state: V,
    },
    /// A move, passed through unchanged.
    Move {
        /// Who moved.
        player: PlayerId,
        /// The move payload.
        #[serde(rename = "move")]
        mv: M,
    },
}

/// Append-only, order-preserving event log with snapshot coalescing.
#[derive(Debug, Clone)]
pub struct HistoryLog<S, M> {
    events: Vec<HistoryEntry<S, M>>,
    pending: Option<S>,
}

impl<S, M> HistoryLog<S, M> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            pending: None,
        }
    }

    /// Buffers `state` as the latest snapshot, replacing any earlier one.
    ///
    /// The log takes ownership, so it never aliases state the rules module
    /// goes on to mutate.
    #[instrument(skip_all)]
    pub fn record_transition(&mut self, state: S) {
        let replaced = self.pending.replace(state).is_some();
        trace!(replaced, "Buffered state snapshot");
    }

    /// Commits the pending snapshot, if any, then appends the move.
    #[instrument(skip(self, mv))]
    pub fn record_move(&mut self, player: PlayerId, mv: M) {
        if let Some(state) = self.pending.take() {
            self.events.push(HistoryEntry::StateSnapshot(state));
        }
        self.events.push(HistoryEntry::MoveRecord { player, mv });
        trace!(len = self.events.len(), "Recorded move");
    }

    /// Replays committed entries, projecting every snapshot through `project`.
    pub fn replay<V>(&self, mut project: impl FnMut(&S) -> V) -> Vec<ReplayEntry<V, M>>
    where
        M: Clone,
    {
        self.events
            .iter()
            .map(|entry| match entry {
                HistoryEntry::StateSnapshot(state) => ReplayEntry::State {
                    state: project(state),
                },
                HistoryEntry::MoveRecord { player, mv } => ReplayEntry::Move {
                    player: *player,
                    mv: mv.clone(),
                },
            })
            .collect()
    }

    /// Committed entries in order.
    pub fn entries(&self) -> &[HistoryEntry<S, M>] {
        &self.events
    }

    /// The buffered snapshot not yet committed.
    pub fn pending(&self) -> Option<&S> {
        self.pending.as_ref()
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<S, M> Default for HistoryLog<S, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(slot: u32) -> PlayerId {
        PlayerId::new(slot)
    }

    #[test]
    fn test_transitions_without_moves_stay_pending() {
        let mut log: HistoryLog<u32, &str> = HistoryLog::new();
        log.record_transition(1);
        log.record_transition(2);
        assert!(log.is_empty());
        assert_eq!(log.pending(), Some(&2));
    }

    #[test]
    fn test_move_flushes_latest_snapshot_only() {
        let mut log: HistoryLog<u32, &str> = HistoryLog::new();
        log.record_transition(1);
        log.record_transition(2);
        log.record_move(p(1), "a");
        log.record_move(p(2), "b");
        log.record_transition(3);
        log.record_move(p(1), "c");

        assert_eq!(
            log.entries(),
            &[
                HistoryEntry::StateSnapshot(2),
                HistoryEntry::MoveRecord { player: p(1), mv: "a" },
                HistoryEntry::MoveRecord { player: p(2), mv: "b" },
                HistoryEntry::StateSnapshot(3),
                HistoryEntry::MoveRecord { player: p(1), mv: "c" },
            ]
        );
        assert_eq!(log.pending(), None);
    }

    #[test]
    fn test_never_two_consecutive_snapshots() {
        let mut log: HistoryLog<u32, u32> = HistoryLog::new();
        for step in 0..50u32 {
            match step % 3 {
                0 | 1 => log.record_transition(step),
                _ => log.record_move(p(step % 2 + 1), step),
            }
        }
        let adjacent_snapshots = log.entries().windows(2).any(|pair| {
            matches!(
                pair,
                [HistoryEntry::StateSnapshot(_), HistoryEntry::StateSnapshot(_)]
            )
        });
        assert!(!adjacent_snapshots);
    }

    #[test]
    fn test_replay_projects_snapshots() {
        let mut log: HistoryLog<u32, &str> = HistoryLog::new();
        log.record_transition(10);
        log.record_move(p(1), "x");

        let replay = log.replay(|state| format!("seen {state}"));
        assert_eq!(
            replay,
            vec![
                ReplayEntry::State {
                    state: "seen 10".to_string()
                },
                ReplayEntry::Move {
                    player: p(1),
                    mv: "x"
                },
            ]
        );
    }

    #[test]
    fn test_replay_entry_json_shape() {
        let entry: ReplayEntry<u32, &str> = ReplayEntry::Move {
            player: p(2),
            mv: "b2",
        };
        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "move", "player": 2, "move": "b2"})
        );
    }
}
