//! Contains common, primitive types shared by every part of the crate.
//!
//! This module defines the ID types used to identify tasks and resources inside a
//! `Scheduler`, the set type used to declare requirements, and the lifecycle state a
//! registered task moves through. Using distinct key types keeps a `TaskId` from ever
//! being passed where a `ResourceId` is expected.

use serde::Serialize;
use slotmap::new_key_type;
use std::collections::BTreeSet;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a task registered with a `Scheduler`.
    ///
    /// Keys are generational: once a task is discarded its id will never alias a
    /// task registered later, preventing stale ID bugs.
    pub struct TaskId;

    /// Identifies an exclusive, contended resource (a drivetrain, an arm, a shooter).
    ///
    /// A resource is owned by at most one running task at the end of every tick.
    pub struct ResourceId;
}

/// The set of resources a task needs exclusive control of.
///
/// Ordered so that arbitration walks resources deterministically.
pub type ResourceSet = BTreeSet<ResourceId>;

/// Where a registered task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Registered, waiting for the next admission pass.
    Pending,
    /// Started and holding its resources.
    Running,
    /// Cut short because one of its resources was reassigned, or it was cancelled.
    Interrupted,
    /// Reached its own completion condition.
    Finished,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Interrupted => "interrupted",
            TaskState::Finished => "finished",
        };
        f.write_str(label)
    }
}
