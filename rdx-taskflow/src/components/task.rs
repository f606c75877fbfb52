//! The `Task` contract and the shared handle used to hand one task instance to
//! several owners.

use crate::common::ResourceSet;
use crate::time::TickContext;
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A unit of cooperative work advanced one tick at a time.
///
/// The scheduler (or an owning `CompositeTask`) drives every method; a task never
/// calls them on itself. Within one run the order is always `start`, then zero or more
/// `step` + `is_finished` pairs, then exactly one `end`. A task may be run again after
/// `end`, so `start` must reset whatever state the previous run left behind.
///
/// Nothing here may block. Errors are not recovered: they abort the current tick and
/// come back out of `Scheduler::tick`.
pub trait Task: Send {
    /// A label for logs and events.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }

    /// The resources this task needs exclusive control of right now.
    ///
    /// May shrink while the task runs (a group releases what its finished children
    /// needed) but must never grow.
    fn requirements(&self) -> ResourceSet {
        ResourceSet::new()
    }

    /// Called once when the task is admitted, before the first `step`.
    fn start(&mut self, _ctx: &TickContext) -> Result<()> {
        Ok(())
    }

    /// One tick of work.
    fn step(&mut self, _ctx: &TickContext) -> Result<()> {
        Ok(())
    }

    /// Checked after every `step`.
    fn is_finished(&mut self, ctx: &TickContext) -> Result<bool>;

    /// Cleanup. `interrupted` is `true` when the task was cut short, by a resource
    /// takeover, a cancel, or a timeout enforced by its group.
    fn end(&mut self, _ctx: &TickContext, _interrupted: bool) -> Result<()> {
        Ok(())
    }

    /// Whether another task may take this one's resources away.
    fn interruptible(&self) -> bool {
        true
    }

    /// Identity of the underlying instance when the task is shared, so the scheduler
    /// can tell that two registrations are the same object.
    #[doc(hidden)]
    fn instance_key(&self) -> Option<usize> {
        None
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn requirements(&self) -> ResourceSet {
        (**self).requirements()
    }

    fn start(&mut self, ctx: &TickContext) -> Result<()> {
        (**self).start(ctx)
    }

    fn step(&mut self, ctx: &TickContext) -> Result<()> {
        (**self).step(ctx)
    }

    fn is_finished(&mut self, ctx: &TickContext) -> Result<bool> {
        (**self).is_finished(ctx)
    }

    fn end(&mut self, ctx: &TickContext, interrupted: bool) -> Result<()> {
        (**self).end(ctx, interrupted)
    }

    fn interruptible(&self) -> bool {
        (**self).interruptible()
    }

    fn instance_key(&self) -> Option<usize> {
        (**self).instance_key()
    }
}

/// A reference-counted handle to one task instance.
///
/// Clones point at the same task; running any clone runs that task. This is what
/// `TaskBuilder::build` hands out, and it is how an application keeps inspecting a
/// task after giving it to the scheduler.
pub struct SharedTask<T: ?Sized> {
    inner: Arc<Mutex<T>>,
}

impl<T> SharedTask<T> {
    pub fn new(task: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(task)),
        }
    }
}

impl<T: ?Sized> SharedTask<T> {
    /// `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Locks the instance for inspection or modification.
    ///
    /// A panic inside another holder does not poison the task for everyone else.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized> Clone for SharedTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Task + ?Sized> Task for SharedTask<T> {
    fn name(&self) -> String {
        self.lock().name()
    }

    fn requirements(&self) -> ResourceSet {
        self.lock().requirements()
    }

    fn start(&mut self, ctx: &TickContext) -> Result<()> {
        self.lock().start(ctx)
    }

    fn step(&mut self, ctx: &TickContext) -> Result<()> {
        self.lock().step(ctx)
    }

    fn is_finished(&mut self, ctx: &TickContext) -> Result<bool> {
        self.lock().is_finished(ctx)
    }

    fn end(&mut self, ctx: &TickContext, interrupted: bool) -> Result<()> {
        self.lock().end(ctx, interrupted)
    }

    fn interruptible(&self) -> bool {
        self.lock().interruptible()
    }

    fn instance_key(&self) -> Option<usize> {
        Some(Arc::as_ptr(&self.inner) as *const () as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::quick::InstantTask;

    #[test]
    fn test_default_name_is_short_type_name() {
        assert_eq!(InstantTask::noop().name(), "InstantTask");
    }

    #[test]
    fn test_shared_clones_are_one_instance() {
        let first = SharedTask::new(InstantTask::noop());
        let second = first.clone();
        let other = SharedTask::new(InstantTask::noop());
        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&other));
        assert_eq!(first.instance_key(), second.instance_key());
        assert_ne!(first.instance_key(), other.instance_key());
    }

    #[test]
    fn test_boxed_task_delegates() {
        let mut boxed: Box<dyn Task> = Box::new(SharedTask::new(InstantTask::noop()));
        assert!(boxed.instance_key().is_some());
        assert!(boxed.is_finished(&TickContext::default()).unwrap());
    }
}
