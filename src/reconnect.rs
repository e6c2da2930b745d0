//! Bounded reconnection backoff.
//!
//! [`Reconnect`] counts attempts, grows the delay between them, and keeps at
//! most one timer task alive. It knows nothing about transports: every tick
//! invokes the `on_next` callback and exhaustion invokes `on_end`.
//!
//! # State Machine
//!
//! ```text
//!          start()                 timer fires
//!   Idle ──────────► Scheduled ──────────────► on_next() ──► start() ...
//!    ▲                                                          │
//!    │        attempts >= max: reset state, on_end()            │
//!    └──────────────────────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::{DelayIncrease, ReconnectConfig};
use crate::protocol::CloseCode;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked by the scheduler.
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// ReconnectCallbacks
// ============================================================================

/// Callbacks driven by the scheduler.
#[derive(Clone)]
pub struct ReconnectCallbacks {
    /// Called on every timer tick, after the delay has grown.
    pub on_next: ReconnectCallback,
    /// Called once when the attempt ceiling is reached.
    pub on_end: ReconnectCallback,
}

impl fmt::Debug for ReconnectCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectCallbacks").finish_non_exhaustive()
    }
}

// ============================================================================
// ReconnectState
// ============================================================================

/// Mutable part of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    /// Delay for the next scheduled attempt.
    pub delay: Duration,
    /// Attempts started in the current session.
    pub attempts: u32,
}

/// State guarded by the scheduler lock.
struct Inner {
    state: ReconnectState,
    /// Pending timer task.
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is invalidated.
    epoch: u64,
}

impl Inner {
    /// Cancels the pending timer, if any.
    fn clear_timer(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// ============================================================================
// Reconnect
// ============================================================================

/// Bounded retry scheduler.
///
/// Must be driven from within a Tokio runtime; [`Reconnect::start`] spawns
/// the timer task.
pub struct Reconnect {
    initial: ReconnectState,
    attempts_max: u32,
    delay_increase: DelayIncrease,
    skip_close_codes: FxHashSet<CloseCode>,
    callbacks: ReconnectCallbacks,
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for Reconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconnect")
            .field("initial", &self.initial)
            .field("state", &self.inner.lock().state)
            .field("attempts_max", &self.attempts_max)
            .field("delay_increase", &self.delay_increase)
            .finish_non_exhaustive()
    }
}

impl Reconnect {
    /// Creates an idle scheduler from a policy.
    #[must_use]
    pub fn new(policy: &ReconnectConfig, callbacks: ReconnectCallbacks) -> Self {
        let initial = ReconnectState {
            delay: policy.delay,
            attempts: 0,
        };

        Self {
            initial,
            attempts_max: policy.attempts,
            delay_increase: policy.delay_increase,
            skip_close_codes: policy.skip_close_codes.iter().copied().collect(),
            callbacks,
            inner: Arc::new(Mutex::new(Inner {
                state: initial,
                timer: None,
                epoch: 0,
            })),
        }
    }

    /// Returns `true` if `code` may trigger a reconnection.
    #[inline]
    #[must_use]
    pub fn can_apply(&self, code: CloseCode) -> bool {
        !self.skip_close_codes.contains(&code)
    }

    /// Returns `true` if a session is in progress.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.lock().state.attempts > self.initial.attempts
    }

    /// Returns the attempts started in the current session.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.lock().state.attempts
    }

    /// Returns the delay the next scheduled attempt will wait.
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.lock().state.delay
    }

    /// Starts the next attempt.
    ///
    /// Schedules a timer for the current delay, replacing any pending one.
    /// When the attempt count reaches the ceiling the state resets and
    /// `on_end` runs instead.
    pub fn start(&self) {
        let exhausted = {
            let mut inner = self.inner.lock();
            inner.state.attempts += 1;

            if inner.state.attempts >= self.attempts_max {
                debug!(attempts = inner.state.attempts, "Reconnect attempts exhausted");
                inner.state = self.initial;
                inner.clear_timer();
                true
            } else {
                inner.clear_timer();
                self.schedule(&mut inner);
                false
            }
        };

        if exhausted {
            (self.callbacks.on_end)();
        }
    }

    /// Ends the session: resets state and cancels the pending timer.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.state = self.initial;
        inner.clear_timer();
    }

    /// Spawns the timer task for the current state.
    fn schedule(&self, inner: &mut Inner) {
        let delay = inner.state.delay;
        let epoch = inner.epoch;
        let attempt = inner.state.attempts;
        let shared = Arc::clone(&self.inner);
        let delay_increase = self.delay_increase;
        let on_next = Arc::clone(&self.callbacks.on_next);

        trace!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        inner.timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            if Self::perform(&shared, epoch, delay_increase) {
                on_next();
            }
        }));
    }

    /// Grows the delay for the fired timer.
    ///
    /// Returns `false` if the timer was cancelled while it was firing.
    fn perform(shared: &Mutex<Inner>, epoch: u64, delay_increase: DelayIncrease) -> bool {
        let mut inner = shared.lock();
        if inner.epoch != epoch {
            return false;
        }

        inner.state.delay = delay_increase.apply(inner.state.delay);
        inner.timer = None;
        true
    }
}

impl Drop for Reconnect {
    fn drop(&mut self) {
        self.inner.lock().clear_timer();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;
    use tokio::time::Instant;

    fn policy(delay_ms: u64, attempts: u32, delay_increase: DelayIncrease) -> ReconnectConfig {
        ReconnectConfig::new(Duration::from_millis(delay_ms), attempts)
            .with_delay_increase(delay_increase)
            .with_skip_close_codes([CloseCode::NORMAL])
    }

    fn ticking(
        config: &ReconnectConfig,
    ) -> (Reconnect, mpsc::UnboundedReceiver<Instant>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ended = Arc::new(AtomicUsize::new(0));
        let ended_clone = Arc::clone(&ended);

        let callbacks = ReconnectCallbacks {
            on_next: Arc::new(move || {
                let _ = tx.send(Instant::now());
            }),
            on_end: Arc::new(move || {
                ended_clone.fetch_add(1, Ordering::SeqCst);
            }),
        };

        (Reconnect::new(config, callbacks), rx, ended)
    }

    fn assert_close_to(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_can_apply() {
        let (reconnect, _rx, _ended) = ticking(&policy(10, 4, DelayIncrease::Constant));
        assert!(!reconnect.can_apply(CloseCode::NORMAL));
        assert!(reconnect.can_apply(CloseCode::UNSUPPORTED_DATA));
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_delay() {
        let (reconnect, mut rx, _ended) = ticking(&policy(100, 10, DelayIncrease::Constant));

        let mut last = Instant::now();
        for _ in 0..3 {
            reconnect.start();
            let fired = rx.recv().await.unwrap();
            assert_close_to(fired - last, Duration::from_millis(100));
            last = fired;
        }
        assert_eq!(reconnect.delay(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_doubling_delay_sequence() {
        let (reconnect, mut rx, _ended) = ticking(&policy(100, 10, DelayIncrease::Doubling));

        let mut last = Instant::now();
        for expected in [100, 200, 400, 800] {
            reconnect.start();
            let fired = rx.recv().await.unwrap();
            assert_close_to(fired - last, Duration::from_millis(expected));
            last = fired;
        }
        assert_eq!(reconnect.delay(), Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_resets_and_ends() {
        let (reconnect, mut rx, ended) = ticking(&policy(10, 4, DelayIncrease::Doubling));

        for attempt in 1..=3 {
            reconnect.start();
            assert_eq!(reconnect.attempts(), attempt);
            assert!(reconnect.is_started());
            rx.recv().await.unwrap();
        }

        reconnect.start();
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert_eq!(reconnect.attempts(), 0);
        assert_eq!(reconnect.delay(), Duration::from_millis(10));
        assert!(!reconnect.is_started());

        sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let (reconnect, mut rx, ended) = ticking(&policy(50, 4, DelayIncrease::Constant));

        reconnect.start();
        reconnect.stop();
        assert!(!reconnect.is_started());

        sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(ended.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_timer() {
        let (reconnect, mut rx, _ended) = ticking(&policy(50, 10, DelayIncrease::Constant));

        reconnect.start();
        reconnect.start();

        rx.recv().await.unwrap();
        sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err(), "only one timer may fire");
        assert_eq!(reconnect.attempts(), 2);
    }
}
