/*
[INPUT]:  Heartbeat periods and reconnect delays
[OUTPUT]: Timers whose lifetime is visible through a shared counter
[POS]:    WebSocket layer - scoped timer bookkeeping for the connection worker
[UPDATE]: When adding new timer kinds to the connection lifecycle
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Counts timers that are currently alive.
///
/// Every timer holds a guard; dropping the timer (including by cancelling the task that owns
/// it) releases the guard.
#[derive(Debug, Clone, Default)]
pub struct TimerTracker {
    live: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct TimerGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TimerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn guard(&self) -> TimerGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        TimerGuard {
            live: self.live.clone(),
        }
    }

    /// One-shot delay
    pub async fn sleep(&self, delay: Duration) {
        let _guard = self.guard();
        tokio::time::sleep(delay).await;
    }

    /// Repeating timer whose first tick fires one full `period` from now
    pub fn interval(&self, period: Duration) -> TrackedInterval {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        TrackedInterval {
            interval,
            _guard: self.guard(),
        }
    }
}

#[derive(Debug)]
pub struct TrackedInterval {
    interval: Interval,
    _guard: TimerGuard,
}

impl TrackedInterval {
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}
