//! Small ready-made tasks built from closures: run once, run forever, or release a
//! resource.

use super::task::Task;
use crate::common::{ResourceId, ResourceSet};
use crate::time::TickContext;
use anyhow::Result;

/// A function closure run by [`InstantTask`] and [`ContinuousTask`].
pub type Action = Box<dyn FnMut() -> Result<()> + Send>;

fn boxed(mut action: impl FnMut() + Send + 'static) -> Action {
    Box::new(move || {
        action();
        Ok(())
    })
}

/// Runs its action once when started and is finished on its first check.
pub struct InstantTask {
    label: Option<String>,
    action: Action,
    requirements: ResourceSet,
}

impl InstantTask {
    pub fn new(action: impl FnMut() + Send + 'static) -> Self {
        Self {
            label: None,
            action: boxed(action),
            requirements: ResourceSet::new(),
        }
    }

    pub fn fallible(action: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        Self {
            label: None,
            action: Box::new(action),
            requirements: ResourceSet::new(),
        }
    }

    /// Does nothing at all. Used as the missing branch of `if_then`.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn requiring(mut self, resource: ResourceId) -> Self {
        self.requirements.insert(resource);
        self
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl Task for InstantTask {
    fn name(&self) -> String {
        self.label.clone().unwrap_or_else(|| "InstantTask".to_string())
    }

    fn requirements(&self) -> ResourceSet {
        self.requirements.clone()
    }

    fn start(&mut self, _ctx: &TickContext) -> Result<()> {
        (self.action)()
    }

    fn is_finished(&mut self, _ctx: &TickContext) -> Result<bool> {
        Ok(true)
    }
}

/// Runs its action on every step and never finishes on its own.
///
/// The usual shape of a default task: hold the resource and keep it in a safe state
/// until something else needs it.
pub struct ContinuousTask {
    label: Option<String>,
    action: Action,
    requirements: ResourceSet,
    interruptible: bool,
}

impl ContinuousTask {
    pub fn new(action: impl FnMut() + Send + 'static) -> Self {
        Self {
            label: None,
            action: boxed(action),
            requirements: ResourceSet::new(),
            interruptible: true,
        }
    }

    pub fn fallible(action: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        Self {
            label: None,
            action: Box::new(action),
            requirements: ResourceSet::new(),
            interruptible: true,
        }
    }

    /// Holds `resource` for as long as the task runs.
    pub fn requiring(mut self, resource: ResourceId) -> Self {
        self.requirements.insert(resource);
        self
    }

    /// Refuses takeovers: a task that needs one of these resources is rejected instead.
    pub fn uninterruptible(mut self) -> Self {
        self.interruptible = false;
        self
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl Task for ContinuousTask {
    fn name(&self) -> String {
        self.label.clone().unwrap_or_else(|| "ContinuousTask".to_string())
    }

    fn requirements(&self) -> ResourceSet {
        self.requirements.clone()
    }

    fn step(&mut self, _ctx: &TickContext) -> Result<()> {
        (self.action)()
    }

    fn is_finished(&mut self, _ctx: &TickContext) -> Result<bool> {
        Ok(false)
    }

    fn interruptible(&self) -> bool {
        self.interruptible
    }
}

/// Claims a resource and immediately lets go of it.
///
/// Registering one interrupts whatever holds the resource; on the following tick the
/// release finishes, the resource goes idle, and its default task resumes.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseTask {
    resource: ResourceId,
}

impl ReleaseTask {
    pub fn new(resource: ResourceId) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }
}

impl Task for ReleaseTask {
    fn requirements(&self) -> ResourceSet {
        ResourceSet::from([self.resource])
    }

    fn is_finished(&mut self, _ctx: &TickContext) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_release_requires_exactly_its_resource() {
        let mut keys: SlotMap<ResourceId, ()> = SlotMap::with_key();
        let arm = keys.insert(());
        let mut release = ReleaseTask::new(arm);
        assert_eq!(release.requirements(), ResourceSet::from([arm]));
        assert!(release.is_finished(&TickContext::default()).unwrap());
    }

    #[test]
    fn test_instant_runs_on_start_only() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let mut task = InstantTask::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let ctx = TickContext::default();
        task.start(&ctx).unwrap();
        task.step(&ctx).unwrap();
        assert!(task.is_finished(&ctx).unwrap());
        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert_eq!(task.name(), "InstantTask");
        assert_eq!(InstantTask::noop().named("stow").name(), "stow");
    }

    #[test]
    fn test_continuous_runs_every_step_and_never_finishes() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let mut task = ContinuousTask::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .uninterruptible();
        let ctx = TickContext::default();
        task.start(&ctx).unwrap();
        for _ in 0..3 {
            task.step(&ctx).unwrap();
            assert!(!task.is_finished(&ctx).unwrap());
        }
        assert_eq!(runs.load(Ordering::Relaxed), 3);
        assert!(!task.interruptible());
    }
}
