//! Timer channels for pollers and debouncers.
//!
//! Every timer in the crate is a `Receiver<Instant>` so it can sit in a
//! `crossbeam_channel::select!` next to input and shutdown channels:
//!
//! - `TickSource::ticks(period)`: a recurring tick, first delivered one `period` after creation.
//! - `TickSource::after(delay)`: a one-shot deadline.
//!
//! `SystemClock` maps straight onto `crossbeam_channel::tick`/`after`. `ManualClock`
//! only moves when `advance` is called, which lets tests walk through minutes of
//! polling without sleeping.
//!
//! Design notes:
//! - Like crossbeam's own tick channel, a manual tick channel holds at most one
//!   undelivered tick; ticks that find it full are dropped.
//! - Timers whose receiver has been dropped are forgotten the next time they fire, so
//!   replacing a deadline is just a matter of dropping the old receiver.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::sync::lock;

/// Source of timer channels.
pub trait TickSource: Send + Sync {
    /// Recurring ticks every `period`; the first one arrives after one full period.
    fn ticks(&self, period: Duration) -> Receiver<Instant>;

    /// A single message once `delay` has elapsed.
    fn after(&self, delay: Duration) -> Receiver<Instant>;
}

/// Wall-clock timers backed by crossbeam's timer channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TickSource for SystemClock {
    fn ticks(&self, period: Duration) -> Receiver<Instant> {
        crossbeam_channel::tick(period)
    }

    fn after(&self, delay: Duration) -> Receiver<Instant> {
        crossbeam_channel::after(delay)
    }
}

struct Timer {
    due: Duration,
    period: Option<Duration>,
    tx: Sender<Instant>,
}

struct ManualState {
    origin: Instant,
    elapsed: Duration,
    timers: Vec<Timer>,
}

/// Simulated clock that only moves forward when told to.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// A clock at simulated time zero.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                timers: Vec::new(),
            })),
        }
    }

    /// Simulated time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        lock(&self.state).elapsed
    }

    /// Move the clock forward by `by`, firing every timer that falls due on the way
    /// in chronological order.
    pub fn advance(&self, by: Duration) {
        let mut state = lock(&self.state);
        let target = state.elapsed + by;

        loop {
            let next = state
                .timers
                .iter()
                .enumerate()
                .filter(|(_, timer)| timer.due <= target)
                .min_by_key(|(_, timer)| timer.due)
                .map(|(index, _)| index);
            let Some(index) = next else { break };

            let due = state.timers[index].due;
            state.elapsed = due;
            let instant = state.origin + due;

            match state.timers[index].tx.try_send(instant) {
                Err(TrySendError::Disconnected(_)) => {
                    state.timers.swap_remove(index);
                    continue;
                }
                Ok(()) | Err(TrySendError::Full(_)) => {}
            }

            match state.timers[index].period {
                Some(period) => state.timers[index].due = due + period,
                None => {
                    state.timers.swap_remove(index);
                }
            }
        }
        state.elapsed = target;
    }

    fn register(&self, delay: Duration, period: Option<Duration>) -> Receiver<Instant> {
        let (tx, rx) = bounded(1);
        let mut state = lock(&self.state);
        let due = state.elapsed + delay;
        // A zero period would fire forever within one advance.
        let period = period.filter(|p| !p.is_zero());
        state.timers.push(Timer { due, period, tx });
        rx
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for ManualClock {
    fn ticks(&self, period: Duration) -> Receiver<Instant> {
        self.register(period, Some(period))
    }

    fn after(&self, delay: Duration) -> Receiver<Instant> {
        self.register(delay, None)
    }
}
