//! Cancellable single-shot turn clock.

use crate::error::{SessionError, SessionErrorKind};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Identifies one `start` of a [`TurnTimer`].
///
/// The fire callback receives the generation it was scheduled under. A
/// fire that lost a race with `stop` or a newer `start` carries a stale
/// generation and must be ignored by its receiver.
pub type TimerGeneration = u64;

/// A countdown that runs a callback once unless stopped first.
///
/// At most one fire is pending at a time: starting again cancels the
/// previous schedule.
#[derive(Debug)]
pub struct TurnTimer {
    runtime: Handle,
    pending: Option<JoinHandle<()>>,
    started_at: Option<Instant>,
    generation: TimerGeneration,
}

impl TurnTimer {
    /// Creates an idle timer that schedules on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: None,
            started_at: None,
            generation: 0,
        }
    }

    /// Creates an idle timer bound to the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionErrorKind::RuntimeUnavailable`] outside a tokio runtime.
    #[track_caller]
    pub fn try_current() -> Result<Self, SessionError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SessionError::new(SessionErrorKind::RuntimeUnavailable))
    }

    /// Schedules `on_fire` to run after `duration`, replacing any pending fire.
    #[instrument(skip(self, on_fire))]
    pub fn start<F>(&mut self, duration: Duration, on_fire: F) -> TimerGeneration
    where
        F: FnOnce(TimerGeneration) + Send + 'static,
    {
        self.cancel_pending();
        self.generation += 1;
        let generation = self.generation;
        self.started_at = Some(Instant::now());

        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            trace!(generation, "Turn timer fired");
            on_fire(generation);
        }));

        debug!(generation, "Turn timer started");
        generation
    }

    /// Restarts the think-time measurement without scheduling a fire.
    pub fn start_untimed(&mut self) -> TimerGeneration {
        self.cancel_pending();
        self.generation += 1;
        self.started_at = Some(Instant::now());
        debug!(generation = self.generation, "Untimed turn started");
        self.generation
    }

    /// Cancels any pending fire and returns the time since the last start.
    ///
    /// Returns zero if the timer was never started or was already stopped.
    #[instrument(skip(self))]
    pub fn stop(&mut self) -> Duration {
        self.cancel_pending();
        let elapsed = self
            .started_at
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        debug!(elapsed_ms, "Turn timer stopped");
        elapsed
    }

    /// Whether `generation` belongs to the latest start that was not stopped.
    pub fn is_current(&self, generation: TimerGeneration) -> bool {
        self.started_at.is_some() && generation == self.generation
    }

    /// Records that the fire for `generation` is being handled.
    ///
    /// The start instant is kept so a later `stop` still reports the full
    /// think-time. Returns `false` for a stale generation.
    pub fn mark_fired(&mut self, generation: TimerGeneration) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Whether a fire is scheduled.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut timer = TurnTimer::try_current().expect("runtime");
        let seen = Arc::clone(&fired);
        let generation = timer.start(Duration::from_millis(100), move |g| {
            seen.store(g, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(99)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), generation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_and_reports_elapsed() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut timer = TurnTimer::try_current().expect("runtime");
        let seen = Arc::clone(&fired);
        timer.start(Duration::from_millis(500), move |g| {
            seen.store(g, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        let elapsed = timer.stop();
        assert!(elapsed >= Duration::from_millis(120), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(130), "elapsed {elapsed:?}");
        assert_eq!(timer.stop(), Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_fire() {
        let fires = Arc::new(AtomicU64::new(0));
        let mut timer = TurnTimer::try_current().expect("runtime");

        let first = Arc::clone(&fires);
        let stale = timer.start(Duration::from_millis(100), move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = Arc::clone(&fires);
        let current = timer.start(Duration::from_millis(300), move |_| {
            second.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!timer.is_current(stale));
        assert!(timer.is_current(current));

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_never_started_stop_is_zero() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        let mut timer = TurnTimer::new(runtime.handle().clone());
        assert_eq!(timer.stop(), Duration::ZERO);
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_try_current_outside_runtime() {
        let err = TurnTimer::try_current().unwrap_err();
        assert_eq!(err.kind(), &SessionErrorKind::RuntimeUnavailable);
    }
}
