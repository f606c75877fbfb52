//! Time as the scheduler sees it.
//!
//! The scheduler has no timer of its own. Elapsed time is the running sum of the
//! `delta` a driver passes to `Scheduler::tick`, and the match clock is an external
//! [`TimeSource`] sampled once at the top of every tick. Both are handed to tasks in a
//! [`TickContext`].
//!
//! [`SystemClock`] is the real-time driver: it ticks a scheduler at the cadence of a
//! [`ClockResolution`] until told to shut down.

use crate::config::ClockResolution;
use crate::error::TaskflowError;
use crate::scheduler::Scheduler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, trace};

/// Everything a task may know about "now" during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickContext {
    /// 1-based number of the tick being processed (0 outside of any tick).
    pub tick: u64,
    /// Time since the previous tick, as reported by the driver.
    pub delta: Duration,
    /// Sum of all deltas since the scheduler was created.
    pub elapsed: Duration,
    /// The match clock, sampled once for this tick.
    pub match_time: Duration,
}

/// An external clock the scheduler samples once per tick.
pub trait TimeSource: Send {
    /// The current reading of this clock.
    fn now(&self) -> Duration;
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying reading, so a test (or a shell) can keep one handle
/// while the scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reading.
    pub fn set(&self, time: Duration) {
        self.nanos.store(saturating_nanos(time), Ordering::Relaxed);
    }

    /// Moves the reading forward.
    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(saturating_nanos(by), Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Wall time since the clock was created. A natural match clock for a live driver.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Converts a user-supplied number of seconds into a `Duration`.
///
/// Negative, NaN and infinite values are rejected so bad input fails where the task is
/// assembled rather than somewhere inside a tick.
pub fn seconds(value: f64) -> Result<Duration, TaskflowError> {
    Duration::try_from_secs_f64(value).map_err(|_| TaskflowError::InvalidDuration(value))
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// The real-time driver: ticks a scheduler at a fixed cadence.
#[derive(Debug, Clone)]
pub struct SystemClock {
    resolution: ClockResolution,
}

impl SystemClock {
    pub fn new(resolution: ClockResolution) -> Self {
        Self { resolution }
    }

    /// Ticks `scheduler` until a shutdown signal arrives.
    ///
    /// The delta passed to each tick is the measured time since the previous one, so a
    /// late tick still advances waits by the right amount. A task error stops the
    /// driver and is returned.
    pub async fn drive(
        &self,
        scheduler: &mut Scheduler,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let period = self.resolution.tick_period();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = tokio::time::Instant::now();
        info!("SystemClock driving scheduler every {:?}", period);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                now = ticker.tick() => {
                    let delta = now.saturating_duration_since(last);
                    last = now;
                    trace!("Driving tick with delta {:?}", delta);
                    if let Err(e) = scheduler.tick(delta) {
                        error!("Tick failed, stopping the clock: {:#}", e);
                        return Err(e.into());
                    }
                }
            }
        }
        info!("SystemClock stopped after {} ticks.", scheduler.tick_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.set(Duration::from_secs(3));
        clock.advance(Duration::from_millis(500));
        assert_eq!(handle.now(), Duration::from_millis(3500));
    }

    #[test]
    fn test_seconds_rejects_bad_input() {
        assert_eq!(seconds(1.5).unwrap(), Duration::from_millis(1500));
        assert!(matches!(seconds(-0.5), Err(TaskflowError::InvalidDuration(_))));
        assert!(seconds(f64::NAN).is_err());
        assert!(seconds(f64::INFINITY).is_err());
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
