//! A fluent way to assemble a `CompositeTask`.

use crate::components::composite::CompositeTask;
use crate::components::condition::Condition;
use crate::components::conditional::ConditionalTask;
use crate::components::quick::InstantTask;
use crate::components::task::{SharedTask, Task};
use crate::components::wait::{WaitForTask, WaitTask, WaitUntilTask};
use std::time::Duration;

/// Assembles a routine out of sequential and parallel children.
///
/// Every method appends exactly one child and returns the builder for chaining:
///
/// ```rust
/// use std::time::Duration;
/// use taskflow::prelude::*;
///
/// let mut scheduler = Scheduler::new();
/// let intake = scheduler.add_resource("intake");
///
/// let routine = TaskBuilder::named("two-piece")
///     .parallel(ContinuousTask::new(|| {}).requiring(intake))
///     .wait_for_duration(Duration::from_millis(500))
///     .if_then(|| true, InstantTask::noop())
///     .build();
///
/// scheduler.register(routine).unwrap();
/// ```
///
/// The builder wraps one underlying group. Appending after `build` changes the group
/// that was already built. If that group is already running, the scheduler claims any
/// resources the new children need at the start of its next tick, interrupting their
/// holders like any other takeover.
pub struct TaskBuilder {
    group: SharedTask<CompositeTask>,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self::named("routine")
    }

    /// A builder whose group carries `name` in logs and events.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            group: SharedTask::new(CompositeTask::new(name)),
        }
    }

    /// Adds a child in sequence. The next child does not start until this one finishes.
    pub fn sequential(&mut self, task: impl Task + 'static) -> &mut Self {
        self.group.lock().add_sequential(task, None);
        self
    }

    /// Adds a child in sequence that is interrupted if it runs longer than `timeout`.
    pub fn sequential_with_timeout(
        &mut self,
        task: impl Task + 'static,
        timeout: Duration,
    ) -> &mut Self {
        self.group.lock().add_sequential(task, Some(timeout));
        self
    }

    /// Adds a child in parallel. The next child starts immediately while this one keeps
    /// running; the group does not finish until every parallel child has.
    pub fn parallel(&mut self, task: impl Task + 'static) -> &mut Self {
        self.group.lock().add_parallel(task, None);
        self
    }

    /// Adds a child in parallel that is interrupted if it runs longer than `timeout`.
    pub fn parallel_with_timeout(
        &mut self,
        task: impl Task + 'static,
        timeout: Duration,
    ) -> &mut Self {
        self.group.lock().add_parallel(task, Some(timeout));
        self
    }

    /// Waits for a given duration of scheduler time.
    pub fn wait_for_duration(&mut self, duration: Duration) -> &mut Self {
        self.sequential(WaitTask::new(duration))
    }

    /// Waits until the match clock reaches `match_time`.
    pub fn wait_for_match_time(&mut self, match_time: Duration) -> &mut Self {
        self.sequential(WaitUntilTask::new(match_time))
    }

    /// Waits until `condition` returns `true`.
    pub fn wait_for_condition(
        &mut self,
        condition: impl FnMut() -> bool + Send + 'static,
    ) -> &mut Self {
        self.sequential(WaitForTask::new(Condition::new(condition)))
    }

    /// Waits until `condition` returns `true` or `timeout` passes, whichever is first.
    pub fn wait_for_condition_with_timeout(
        &mut self,
        condition: impl FnMut() -> bool + Send + 'static,
        timeout: Duration,
    ) -> &mut Self {
        self.sequential_with_timeout(WaitForTask::new(Condition::new(condition)), timeout)
    }

    /// Runs `if_true` only if `condition` holds when this point of the routine is reached.
    pub fn if_then(
        &mut self,
        condition: impl FnMut() -> bool + Send + 'static,
        if_true: impl Task + 'static,
    ) -> &mut Self {
        self.if_then_else(condition, if_true, InstantTask::noop())
    }

    /// Runs exactly one of two tasks, picked by `condition` when this point of the
    /// routine is reached.
    pub fn if_then_else(
        &mut self,
        condition: impl FnMut() -> bool + Send + 'static,
        if_true: impl Task + 'static,
        if_false: impl Task + 'static,
    ) -> &mut Self {
        self.sequential(ConditionalTask::new(
            Condition::new(condition),
            if_true,
            if_false,
        ))
    }

    /// Returns the assembled group.
    ///
    /// Calling this more than once returns handles to the *same* instance, not fresh
    /// copies: build once, register as often as needed (one run at a time).
    pub fn build(&self) -> SharedTask<CompositeTask> {
        self.group.clone()
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
