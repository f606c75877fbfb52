//! Tasks that do nothing but wait: on elapsed time, on the match clock, or on a
//! predicate. None of them require resources.

use super::condition::Condition;
use super::task::Task;
use crate::time::TickContext;
use anyhow::Result;
use std::time::Duration;

/// Finishes once `duration` of scheduler time has passed since it started.
#[derive(Debug, Clone)]
pub struct WaitTask {
    duration: Duration,
    started_at: Duration,
}

impl WaitTask {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started_at: Duration::ZERO,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Task for WaitTask {
    fn name(&self) -> String {
        format!("wait({:?})", self.duration)
    }

    fn start(&mut self, ctx: &TickContext) -> Result<()> {
        self.started_at = ctx.elapsed;
        Ok(())
    }

    fn is_finished(&mut self, ctx: &TickContext) -> Result<bool> {
        Ok(ctx.elapsed.saturating_sub(self.started_at) >= self.duration)
    }
}

/// Finishes once the match clock reads at least `match_time`.
///
/// Unlike [`WaitTask`] this is anchored to the match, not to when the wait began: a
/// wait for 5s that starts at match time 7s finishes on its first check.
#[derive(Debug, Clone)]
pub struct WaitUntilTask {
    match_time: Duration,
}

impl WaitUntilTask {
    pub fn new(match_time: Duration) -> Self {
        Self { match_time }
    }
}

impl Task for WaitUntilTask {
    fn name(&self) -> String {
        format!("wait_until({:?})", self.match_time)
    }

    fn is_finished(&mut self, ctx: &TickContext) -> Result<bool> {
        Ok(ctx.match_time >= self.match_time)
    }
}

/// Finishes the first time its condition evaluates to `true`.
#[derive(Debug)]
pub struct WaitForTask {
    condition: Condition,
}

impl WaitForTask {
    pub fn new(condition: Condition) -> Self {
        Self { condition }
    }
}

impl Task for WaitForTask {
    fn is_finished(&mut self, _ctx: &TickContext) -> Result<bool> {
        self.condition.evaluate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(elapsed_ms: u64, match_ms: u64) -> TickContext {
        TickContext {
            tick: 0,
            delta: Duration::from_millis(20),
            elapsed: Duration::from_millis(elapsed_ms),
            match_time: Duration::from_millis(match_ms),
        }
    }

    #[test]
    fn test_wait_measures_from_its_own_start() {
        let mut wait = WaitTask::new(Duration::from_millis(100));
        wait.start(&at(1_000, 0)).unwrap();
        assert!(!wait.is_finished(&at(1_060, 0)).unwrap());
        assert!(wait.is_finished(&at(1_100, 0)).unwrap());

        // Restarting resets the anchor.
        wait.start(&at(2_000, 0)).unwrap();
        assert!(!wait.is_finished(&at(2_040, 0)).unwrap());
    }

    #[test]
    fn test_wait_until_uses_match_clock_only() {
        let mut wait = WaitUntilTask::new(Duration::from_secs(5));
        wait.start(&at(60_000, 0)).unwrap();
        assert!(!wait.is_finished(&at(60_000, 4_999)).unwrap());
        assert!(wait.is_finished(&at(0, 5_000)).unwrap());
    }

    #[test]
    fn test_wait_for_follows_condition() {
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let probe = flag.clone();
        let mut wait = WaitForTask::new(Condition::new(move || {
            probe.load(std::sync::atomic::Ordering::Relaxed)
        }));
        assert!(!wait.is_finished(&at(0, 0)).unwrap());
        flag.store(true, std::sync::atomic::Ordering::Relaxed);
        assert!(wait.is_finished(&at(0, 0)).unwrap());
    }
}
