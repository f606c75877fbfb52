//! The typed error returned by the scheduler and by configuration.
//!
//! Failures raised *inside* a task (`start`, `step`, `is_finished`, `end`, or a
//! predicate) are `anyhow::Error`s; the scheduler adds the task's name as context and
//! hands them back as [`TaskflowError::TaskFailed`].

use crate::common::{ResourceId, TaskId};
use thiserror::Error;

/// Errors raised while assembling or registering work.
#[derive(Debug, Error)]
pub enum TaskflowError {
    /// A task declared a resource that was never added to this scheduler.
    #[error("resource {0:?} is not known to this scheduler")]
    UnknownResource(ResourceId),

    /// A default task has to require the resource it is the default for.
    #[error("default task '{task}' does not require resource '{resource}'")]
    DefaultMissingRequirement { task: String, resource: String },

    /// The id does not name a live task.
    #[error("task {0:?} is not registered")]
    UnknownTask(TaskId),

    /// Durations must be finite and non-negative.
    #[error("invalid duration: {0} seconds")]
    InvalidDuration(f64),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A task callback or predicate failed. The tick it happened in was aborted.
    #[error(transparent)]
    TaskFailed(#[from] anyhow::Error),
}

pub type Result<T, E = TaskflowError> = std::result::Result<T, E>;
