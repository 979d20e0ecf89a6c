//! Waiting for collaborators that initialize later than the events that
//! reference them.
//!
//! Bootstrap order is not guaranteed relative to the first navigation (a deep
//! link may be processed before the map or the catalog browser exist), so a
//! missing collaborator is a retryable state. Waits always end: either the
//! condition settles or the deadline elapses and the caller degrades.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{self, Either, LocalBoxFuture};
use tracing::debug;

use crate::timer::Timer;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitStatus {
    Settled,
    TimedOut,
}

impl WaitStatus {
    pub fn is_settled(self) -> bool {
        self == WaitStatus::Settled
    }
}

/// Polls a predicate at a fixed interval until it holds or a deadline passes.
///
/// The deadline is counted in slept intervals rather than wall-clock reads,
/// which keeps waits deterministic under a paused clock.
#[derive(Clone)]
pub struct ReadinessWaiter {
    timer: Rc<dyn Timer>,
    interval: Duration,
    timeout: Duration,
}

impl ReadinessWaiter {
    pub fn new(timer: Rc<dyn Timer>) -> Self {
        Self {
            timer,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn with_defaults(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The predicate is checked once before the first sleep and after every
    /// interval. Never fails; callers branch on the returned status.
    pub async fn wait<P>(&self, mut predicate: P, interval: Duration, timeout: Duration) -> WaitStatus
    where
        P: FnMut() -> bool,
    {
        if predicate() {
            return WaitStatus::Settled;
        }

        let interval = interval.max(Duration::from_millis(1));
        let mut elapsed = Duration::ZERO;
        while elapsed < timeout {
            let step = interval.min(timeout - elapsed);
            self.timer.sleep(step).await;
            elapsed += step;
            if predicate() {
                return WaitStatus::Settled;
            }
        }

        debug!(timeout_ms = timeout.as_millis() as u64, "readiness wait timed out");
        WaitStatus::TimedOut
    }

    /// Waits for `signal`, then polls `predicate`, all under one deadline.
    /// Used for collaborators that must first be registered and then report
    /// ready.
    pub async fn wait_after_signal<P>(
        &self,
        signal: &ReadySignal,
        mut predicate: P,
        interval: Duration,
        timeout: Duration,
    ) -> WaitStatus
    where
        P: FnMut() -> bool,
    {
        if signal.is_fired() && predicate() {
            return WaitStatus::Settled;
        }

        let staged = async {
            signal.fired().await;
            self.wait(predicate, interval, Duration::MAX).await
        };
        match future::select(Box::pin(staged), self.timer.sleep(timeout)).await {
            Either::Left((status, _)) => status,
            Either::Right(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "staged readiness wait timed out");
                WaitStatus::TimedOut
            }
        }
    }
}

#[derive(Default)]
struct SignalState {
    fired: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

/// One-shot broadcast "ready" notification. Clones share the same signal.
#[derive(Clone, Default)]
pub struct ReadySignal {
    inner: Rc<RefCell<SignalState>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fired(&self) -> bool {
        self.inner.borrow().fired
    }

    /// Wakes every pending waiter. Later calls are no-ops.
    pub fn fire(&self) {
        let waiters = {
            let mut state = self.inner.borrow_mut();
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.waiters)
        };
        for tx in waiters {
            let _ = tx.send(());
        }
    }

    /// Resolves once the signal has fired (immediately if it already has).
    pub fn fired(&self) -> LocalBoxFuture<'static, ()> {
        let rx = {
            let mut state = self.inner.borrow_mut();
            if state.fired {
                return Box::pin(future::ready(()));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };
        Box::pin(async move {
            let _ = rx.await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TokioTimer;
    use std::cell::Cell;

    fn waiter() -> ReadinessWaiter {
        ReadinessWaiter::new(Rc::new(TokioTimer))
    }

    #[tokio::test(start_paused = true)]
    async fn settles_immediately_when_predicate_holds() {
        let start = tokio::time::Instant::now();
        let status = waiter()
            .wait(|| true, Duration::from_millis(100), Duration::from_secs(5))
            .await;
        assert_eq!(status, WaitStatus::Settled);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn settles_once_predicate_flips() {
        let polls = Cell::new(0);
        let status = waiter()
            .wait(
                || {
                    polls.set(polls.get() + 1);
                    polls.get() >= 4
                },
                Duration::from_millis(100),
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(status, WaitStatus::Settled);
        assert_eq!(polls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn never_true_predicate_times_out_at_deadline() {
        let start = tokio::time::Instant::now();
        let status = waiter()
            .wait(|| false, Duration::from_millis(100), Duration::from_millis(750))
            .await;
        assert_eq!(status, WaitStatus::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(750));
        assert!(start.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn staged_wait_settles_when_signal_fires() {
        let signal = ReadySignal::new();
        let w = waiter();
        let firing = {
            let signal = signal.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                signal.fire();
            }
        };
        let start = tokio::time::Instant::now();
        let (status, _) = futures::join!(
            w.wait_after_signal(&signal, || true, Duration::from_millis(100), Duration::from_secs(1)),
            firing
        );
        assert_eq!(status, WaitStatus::Settled);
        assert_eq!(start.elapsed(), Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn staged_wait_without_signal_never_polls() {
        let signal = ReadySignal::new();
        let polls = Cell::new(0);
        let status = waiter()
            .wait_after_signal(
                &signal,
                || {
                    polls.set(polls.get() + 1);
                    true
                },
                Duration::from_millis(100),
                Duration::from_millis(200),
            )
            .await;
        assert_eq!(status, WaitStatus::TimedOut);
        assert_eq!(polls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn staged_wait_shares_one_deadline() {
        let signal = ReadySignal::new();
        let w = waiter();
        let firing = {
            let signal = signal.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(400)).await;
                signal.fire();
            }
        };
        let start = tokio::time::Instant::now();
        let (status, _) = futures::join!(
            w.wait_after_signal(&signal, || false, Duration::from_millis(100), Duration::from_millis(500)),
            firing
        );
        assert_eq!(status, WaitStatus::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn staged_wait_polls_after_signal() {
        let signal = ReadySignal::new();
        let polls = Cell::new(0);
        let w = waiter();
        let firing = {
            let signal = signal.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                signal.fire();
            }
        };
        let (status, _) = futures::join!(
            w.wait_after_signal(
                &signal,
                || {
                    polls.set(polls.get() + 1);
                    polls.get() >= 3
                },
                Duration::from_millis(100),
                Duration::from_secs(5),
            ),
            firing
        );
        assert_eq!(status, WaitStatus::Settled);
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn fire_is_idempotent_and_sticky() {
        let signal = ReadySignal::new();
        assert!(!signal.is_fired());
        signal.fire();
        signal.fire();
        assert!(signal.clone().is_fired());
    }
}
