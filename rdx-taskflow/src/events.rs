//! Defines the events broadcast by the scheduler.
//!
//! Subscribers obtain a receiver with `Scheduler::subscribe_events`. Sending never
//! fails the scheduler: with no subscriber attached the event is simply dropped.

use crate::common::{ResourceId, TaskId};
use std::time::Duration;

/// Everything observable about task lifecycles and resource ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A task was queued for the next admission pass.
    TaskRegistered { id: TaskId, name: String },
    /// A task was admitted: its resources are held and `start` has run.
    TaskStarted { id: TaskId, tick: u64 },
    /// A task reached its own completion condition.
    TaskFinished { id: TaskId, tick: u64 },
    /// A task was cut short. `by` is the task that claimed its resource, if any.
    TaskInterrupted {
        id: TaskId,
        by: Option<TaskId>,
        tick: u64,
    },
    /// A task could not be admitted because a holder of one of its resources
    /// refuses to be interrupted.
    TaskRejected { id: TaskId, blocked_by: TaskId },
    /// A resource's default task was set or cleared.
    DefaultChanged {
        resource: ResourceId,
        id: Option<TaskId>,
    },
    /// A resource went idle and its default task was restarted.
    DefaultResumed {
        resource: ResourceId,
        id: TaskId,
        tick: u64,
    },
    /// A resource lost its holder.
    ResourceReleased { resource: ResourceId, tick: u64 },
    /// A full tick was processed.
    TickCompleted { tick: u64, elapsed: Duration },
    /// `remove_all` was called.
    Cleared,
}
