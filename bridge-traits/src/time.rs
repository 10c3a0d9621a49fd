//! Time Abstractions
//!
//! Provides injectable delay scheduling and playback tick sources so the
//! core's retry, grace-period and position-advancement logic can be tested
//! deterministically. Production implementations own their tokio timer
//! resources; the manual doubles advance logical time on demand.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// Delay Provider
// ============================================================================

/// Injectable "wait N seconds" primitive.
///
/// Retry backoff and the connectivity-recovery grace period wait through
/// this trait rather than calling a sleep function directly.
#[async_trait]
pub trait DelayProvider: Send + Sync {
    /// Wait for the given duration.
    async fn delay(&self, duration: Duration);
}

/// Production delay provider backed by the tokio timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl DelayProvider for TokioDelay {
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct DelayWaiter {
    deadline: Duration,
    notify: oneshot::Sender<()>,
}

#[derive(Default)]
struct ManualDelayInner {
    now: Duration,
    waiters: Vec<DelayWaiter>,
}

/// Deterministic delay provider for tests.
///
/// Pending delays are keyed to a logical clock that only moves when
/// [`ManualDelay::advance`] is called. A delay resolves once the clock
/// reaches its deadline; nothing resolves from wall time.
///
/// # Example
///
/// ```ignore
/// let delay = Arc::new(ManualDelay::new());
/// let fut = delay.delay(Duration::from_secs(3));
/// delay.advance(Duration::from_secs(2)); // still pending
/// delay.advance(Duration::from_secs(1)); // resolves
/// ```
#[derive(Default)]
pub struct ManualDelay {
    inner: Mutex<ManualDelayInner>,
}

impl ManualDelay {
    /// Create a manual delay provider with the logical clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the logical clock, resolving every delay whose deadline
    /// has been reached.
    pub fn advance(&self, by: Duration) {
        let fired: Vec<DelayWaiter> = {
            let mut inner = self.inner.lock();
            inner.now += by;
            let now = inner.now;
            let (fired, pending) = inner
                .waiters
                .drain(..)
                .partition(|waiter| waiter.deadline <= now);
            inner.waiters = pending;
            fired
        };
        for waiter in fired {
            // Receiver may have been dropped by a cancelled task.
            let _ = waiter.notify.send(());
        }
    }

    /// Number of delays still waiting on the logical clock.
    pub fn pending(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Current logical time.
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }
}

#[async_trait]
impl DelayProvider for ManualDelay {
    async fn delay(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let receiver = {
            let mut inner = self.inner.lock();
            let (notify, receiver) = oneshot::channel();
            let deadline = inner.now + duration;
            inner.waiters.push(DelayWaiter { deadline, notify });
            receiver
        };
        let _ = receiver.await;
    }
}

// ============================================================================
// Ticker
// ============================================================================

/// Source of periodic playback ticks.
///
/// Each completed `next_tick` represents exactly one elapsed quantum of
/// the owning [`TickerSource`]. A ticker is retired when its source hands
/// out a replacement (playback restarted) or the source is dropped.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick.
    ///
    /// Returns `false` once the ticker has been retired; callers must
    /// stop advancing position at that point.
    async fn next_tick(&mut self) -> bool;
}

/// Factory for [`Ticker`]s with a fixed quantum.
///
/// The playback state machine takes a fresh ticker every time it starts
/// or restarts position advancement (play, seek while playing).
pub trait TickerSource: Send + Sync {
    /// Create a ticker. May retire the previously issued one.
    fn ticker(&self) -> Box<dyn Ticker>;

    /// The fixed quantum each tick represents.
    fn quantum(&self) -> Duration;
}

/// Wall-clock ticker source backed by `tokio::time::interval`.
pub struct IntervalTickerSource {
    quantum: Duration,
}

impl IntervalTickerSource {
    pub fn new(quantum: Duration) -> Self {
        Self { quantum }
    }
}

impl TickerSource for IntervalTickerSource {
    fn ticker(&self) -> Box<dyn Ticker> {
        Box::new(IntervalTicker {
            quantum: self.quantum,
            interval: None,
        })
    }

    fn quantum(&self) -> Duration {
        self.quantum
    }
}

struct IntervalTicker {
    quantum: Duration,
    interval: Option<tokio::time::Interval>,
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn next_tick(&mut self) -> bool {
        let quantum = self.quantum;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(quantum);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval() fires immediately; the first tick must be one
            // full quantum out.
            interval.reset();
            interval
        });
        interval.tick().await;
        true
    }
}

/// Manually stepped ticker source for tests.
///
/// [`ManualTickerSource::tick`] delivers one quantum to the most recently
/// issued ticker. Issuing a new ticker retires the previous one, matching
/// the restart semantics of the production source.
pub struct ManualTickerSource {
    quantum: Duration,
    sender: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl ManualTickerSource {
    pub fn new(quantum: Duration) -> Self {
        Self {
            quantum,
            sender: Mutex::new(None),
        }
    }

    /// Deliver one tick to the active ticker.
    ///
    /// Returns `false` if no ticker is active (playback stopped or the
    /// ticker was retired).
    pub fn tick(&self) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    /// Deliver `count` ticks to the active ticker.
    pub fn tick_many(&self, count: usize) {
        for _ in 0..count {
            if !self.tick() {
                break;
            }
        }
    }

    /// Returns `true` while a ticker issued by this source is live.
    pub fn has_active_ticker(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }
}

impl TickerSource for ManualTickerSource {
    fn ticker(&self) -> Box<dyn Ticker> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Dropping the previous sender retires the previous ticker.
        *self.sender.lock() = Some(tx);
        Box::new(ManualTicker { rx })
    }

    fn quantum(&self) -> Duration {
        self.quantum
    }
}

struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn next_tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
