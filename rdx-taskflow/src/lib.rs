//! # Taskflow
//!
//! Tick-driven task composition with exclusive resource arbitration.
//!
//! Taskflow lets an application describe a routine as a tree of small cooperative
//! tasks, run in sequence or in parallel, with timeouts, waits and branches, and then
//! run those trees under a scheduler that decides which task controls each shared
//! resource.
//!
//! ## Core Concepts
//!
//! - **Task**: a unit of work with `start`, `step`, `is_finished` and `end`, plus the
//!   set of resources it needs. Nothing blocks; all state lives in the task.
//! - **CompositeTask**: ordered sequential and parallel children, each with an optional
//!   timeout. Usually assembled with the fluent [`TaskBuilder`](builder::TaskBuilder).
//! - **Scheduler**: owns registered tasks and advances them one `tick` at a time. A new
//!   task interrupts whoever holds its resources; an idle resource gets its default
//!   task back.
//! - **Driver**: something outside the scheduler calls `tick`. [`SystemClock`](time::SystemClock)
//!   does it in real time; tests and the shell do it by hand.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use taskflow::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut scheduler = Scheduler::new();
//!     let arm = scheduler.add_resource("arm");
//!
//!     // Keep the arm stowed whenever nothing else is using it.
//!     let stow = scheduler.set_default(arm, ContinuousTask::new(|| {}).requiring(arm))?;
//!
//!     let routine = TaskBuilder::named("score")
//!         .sequential(InstantTask::new(|| println!("raise")).requiring(arm))
//!         .wait_for_duration(Duration::from_millis(40))
//!         .sequential(ReleaseTask::new(arm))
//!         .build();
//!     scheduler.register(routine)?;
//!
//!     for _ in 0..6 {
//!         scheduler.tick(Duration::from_millis(20))?;
//!     }
//!     assert!(scheduler.is_running(stow));
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Taskflow Scheduler";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod builder;
pub mod common;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

/// A prelude module for easy importing of the most common Taskflow types.
pub mod prelude {
    pub use crate::builder::TaskBuilder;
    pub use crate::common::{ResourceId, ResourceSet, TaskId, TaskState};
    pub use crate::components::composite::{CompositeTask, ExecutionMode};
    pub use crate::components::condition::Condition;
    pub use crate::components::conditional::ConditionalTask;
    pub use crate::components::quick::{ContinuousTask, InstantTask, ReleaseTask};
    pub use crate::components::task::{SharedTask, Task};
    pub use crate::components::wait::{WaitForTask, WaitTask, WaitUntilTask};
    pub use crate::config::{ClockResolution, TaskflowConfig};
    pub use crate::error::TaskflowError;
    pub use crate::events::SchedulerEvent;
    pub use crate::scheduler::Scheduler;
    pub use crate::time::{ManualClock, MonotonicClock, SystemClock, TickContext, TimeSource};
}
