//! The scheduler that owns running tasks and arbitrates resources.

use crate::common::{ResourceId, ResourceSet, TaskId, TaskState};
use crate::components::task::Task;
use crate::config::TaskflowConfig;
use crate::error::{Result, TaskflowError};
use crate::events::SchedulerEvent;
use crate::time::{TickContext, TimeSource};
use anyhow::Context;
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

const DEFAULT_EVENT_CAPACITY: usize = 64;

struct TaskEntry {
    task: Box<dyn Task>,
    name: String,
    state: TaskState,
    held: ResourceSet,
    default_for: Option<ResourceId>,
}

struct Resource {
    name: String,
    holder: Option<TaskId>,
    default_task: Option<TaskId>,
}

/// Runs registered tasks one tick at a time and decides who owns each resource.
///
/// The scheduler is an ordinary value: create one, hand it to whatever drives the
/// control loop, and call [`tick`](Self::tick) at a steady cadence. Nothing runs
/// between ticks.
///
/// Ownership is settled by interruption, never by waiting. A newly registered task
/// takes its resources from whoever holds them (the holder's `end(true)` runs before
/// the newcomer's `start`). A resource with nobody holding it at the end of a tick has
/// its default task restarted.
pub struct Scheduler {
    tasks: SlotMap<TaskId, TaskEntry>,
    resources: SlotMap<ResourceId, Resource>,
    running: Vec<TaskId>,
    pending: VecDeque<TaskId>,
    match_clock: Option<Box<dyn TimeSource>>,
    elapsed: Duration,
    tick_count: u64,
    event_sender: broadcast::Sender<SchedulerEvent>,
}

// Core implementation block for the tick and arbitration.
impl Scheduler {
    /// Creates an empty scheduler.
    ///
    /// Until a match clock is installed with [`with_match_clock`](Self::with_match_clock),
    /// match time is the scheduler's own elapsed time.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    fn with_event_capacity(capacity: usize) -> Self {
        let (event_sender, _) = broadcast::channel(capacity.max(1));
        Self {
            tasks: SlotMap::with_key(),
            resources: SlotMap::with_key(),
            running: Vec::new(),
            pending: VecDeque::new(),
            match_clock: None,
            elapsed: Duration::ZERO,
            tick_count: 0,
            event_sender,
        }
    }

    /// Creates a scheduler sized and populated from configuration.
    pub fn with_config(config: &TaskflowConfig) -> Self {
        let mut scheduler = Self::with_event_capacity(config.event_capacity);
        for resource in &config.resources {
            scheduler.add_resource(resource.name.clone());
        }
        scheduler
    }

    /// Installs the clock that `wait_for_match_time` waits on.
    pub fn with_match_clock(mut self, clock: impl TimeSource + 'static) -> Self {
        self.match_clock = Some(Box::new(clock));
        self
    }

    /// Advances every task by one tick.
    ///
    /// In order: every running task is stepped and checked, and finished tasks let go of
    /// their resources; newly registered tasks are admitted, interrupting whoever holds
    /// what they need; idle resources get their default task restarted.
    ///
    /// An error from any task aborts the rest of the tick and is returned as-is.
    pub fn tick(&mut self, delta: Duration) -> Result<()> {
        self.tick_count += 1;
        self.elapsed += delta;
        let ctx = self.context(delta);
        trace!("Tick #{} at {:?}", ctx.tick, ctx.elapsed);

        self.advance_running(&ctx)?;
        while let Some(id) = self.pending.pop_front() {
            self.admit(id, &ctx)?;
        }
        self.resume_defaults(&ctx)?;

        self.emit(SchedulerEvent::TickCompleted {
            tick: ctx.tick,
            elapsed: ctx.elapsed,
        });
        Ok(())
    }

    fn context(&self, delta: Duration) -> TickContext {
        let match_time = match &self.match_clock {
            Some(clock) => clock.now(),
            None => self.elapsed,
        };
        TickContext {
            tick: self.tick_count,
            delta,
            elapsed: self.elapsed,
            match_time,
        }
    }

    fn advance_running(&mut self, ctx: &TickContext) -> Result<()> {
        for id in self.running.clone() {
            let claimed: ResourceSet = match self.tasks.get(id) {
                Some(entry) if entry.state == TaskState::Running => entry
                    .task
                    .requirements()
                    .difference(&entry.held)
                    .copied()
                    .collect(),
                _ => continue,
            };
            // A shared group can gain children while it runs.
            if !claimed.is_empty() && !self.claim(id, claimed, ctx)? {
                continue;
            }
            let Some(entry) = self.tasks.get_mut(id) else {
                continue;
            };

            entry
                .task
                .step(ctx)
                .with_context(|| format!("task '{}' failed during step", entry.name))?;
            let finished = entry
                .task
                .is_finished(ctx)
                .with_context(|| format!("task '{}' failed its finish check", entry.name))?;

            if finished {
                entry
                    .task
                    .end(ctx, false)
                    .with_context(|| format!("task '{}' failed while ending", entry.name))?;
                debug!("Task '{}' finished on tick #{}", entry.name, ctx.tick);
                self.retire(id, TaskState::Finished, ctx.tick);
                self.emit(SchedulerEvent::TaskFinished { id, tick: ctx.tick });
            } else {
                let needed = entry.task.requirements();
                let dropped: Vec<ResourceId> = entry.held.difference(&needed).copied().collect();
                entry.held.retain(|r| needed.contains(r));
                for resource in dropped {
                    self.release(resource, id, ctx.tick);
                }
            }
        }
        Ok(())
    }

    /// Current holders of `requirements` other than `id`, deduplicated.
    fn holders_of(&self, id: TaskId, requirements: &ResourceSet) -> Vec<TaskId> {
        let mut holders: Vec<TaskId> = requirements
            .iter()
            .filter_map(|r| self.resources.get(*r).and_then(|res| res.holder))
            .filter(|holder| *holder != id)
            .collect();
        holders.sort();
        holders.dedup();
        holders
    }

    /// The first holder that refuses to be interrupted.
    fn blocker(&self, holders: &[TaskId]) -> Option<TaskId> {
        holders.iter().copied().find(|holder| {
            self.tasks
                .get(*holder)
                .is_some_and(|h| !h.task.interruptible())
        })
    }

    /// Hands extra resources to the running task `id`, interrupting their holders.
    ///
    /// If a holder cannot be interrupted, `id` is interrupted instead and `false` is
    /// returned.
    fn claim(&mut self, id: TaskId, claimed: ResourceSet, ctx: &TickContext) -> Result<bool> {
        let holders = self.holders_of(id, &claimed);
        if let Some(blocked_by) = self.blocker(&holders) {
            warn!(
                "Task '{}' needs a resource held by '{}', which cannot be interrupted",
                self.task_name(id).unwrap_or("?"),
                self.task_name(blocked_by).unwrap_or("?")
            );
            self.interrupt(id, ctx, Some(blocked_by))?;
            return Ok(false);
        }
        for holder in holders {
            self.interrupt(holder, ctx, Some(id))?;
        }
        for resource in &claimed {
            if let Some(res) = self.resources.get_mut(*resource) {
                res.holder = Some(id);
            }
        }
        if let Some(entry) = self.tasks.get_mut(id) {
            debug!("Task '{}' claimed {} more resource(s)", entry.name, claimed.len());
            entry.held.extend(claimed);
        }
        Ok(true)
    }

    /// Drops a task that never got started, unless it is a default.
    fn discard_unstarted(&mut self, id: TaskId) {
        if self
            .tasks
            .get(id)
            .is_some_and(|entry| entry.default_for.is_none())
        {
            self.tasks.remove(id);
        }
    }

    /// Tries to start `id`. Returns `false` if an uninterruptible holder blocked it.
    fn admit(&mut self, id: TaskId, ctx: &TickContext) -> Result<bool> {
        let Some(entry) = self.tasks.get(id) else {
            return Ok(false);
        };
        let requirements = entry.task.requirements();
        let holders = self.holders_of(id, &requirements);

        if let Some(blocked_by) = self.blocker(&holders) {
            warn!(
                "Task '{}' rejected: '{}' cannot be interrupted",
                self.task_name(id).unwrap_or("?"),
                self.task_name(blocked_by).unwrap_or("?")
            );
            self.discard_unstarted(id);
            self.emit(SchedulerEvent::TaskRejected { id, blocked_by });
            return Ok(false);
        }

        for holder in holders {
            if let Err(e) = self.interrupt(holder, ctx, Some(id)) {
                self.discard_unstarted(id);
                return Err(e);
            }
        }

        let Some(entry) = self.tasks.get_mut(id) else {
            return Ok(false);
        };
        if let Err(e) = entry.task.start(ctx) {
            let e = e.context(format!("task '{}' failed to start", entry.name));
            self.discard_unstarted(id);
            return Err(e.into());
        }
        debug!("Task '{}' started on tick #{}", entry.name, ctx.tick);
        entry.state = TaskState::Running;
        for resource in &requirements {
            if let Some(res) = self.resources.get_mut(*resource) {
                res.holder = Some(id);
            }
        }
        entry.held = requirements;
        self.running.push(id);
        self.emit(SchedulerEvent::TaskStarted { id, tick: ctx.tick });
        Ok(true)
    }

    fn resume_defaults(&mut self, ctx: &TickContext) -> Result<()> {
        let idle: Vec<(ResourceId, TaskId)> = self
            .resources
            .iter()
            .filter_map(|(rid, res)| match (res.holder, res.default_task) {
                (None, Some(default)) => Some((rid, default)),
                _ => None,
            })
            .collect();

        for (resource, default) in idle {
            // An earlier default in this pass may already have claimed it.
            if self.holder(resource).is_some() || self.is_running(default) {
                continue;
            }
            let Some(entry) = self.tasks.get(default) else {
                continue;
            };
            let holders = self.holders_of(default, &entry.task.requirements());
            // Stays idle without a rejection until the blocker lets go.
            if let Some(blocked_by) = self.blocker(&holders) {
                trace!(
                    "Default '{}' waiting on '{}'",
                    entry.name,
                    self.task_name(blocked_by).unwrap_or("?")
                );
                continue;
            }
            if self.admit(default, ctx)? {
                debug!(
                    "Resource '{}' idle, resumed default '{}'",
                    self.resource_name(resource).unwrap_or("?"),
                    self.task_name(default).unwrap_or("?")
                );
                self.emit(SchedulerEvent::DefaultResumed {
                    resource,
                    id: default,
                    tick: ctx.tick,
                });
            }
        }
        Ok(())
    }

    /// Ends `id` as interrupted and takes its resources away.
    fn interrupt(&mut self, id: TaskId, ctx: &TickContext, by: Option<TaskId>) -> Result<()> {
        let Some(entry) = self.tasks.get_mut(id) else {
            return Ok(());
        };
        entry
            .task
            .end(ctx, true)
            .with_context(|| format!("task '{}' failed while being interrupted", entry.name))?;
        debug!("Task '{}' interrupted on tick #{}", entry.name, ctx.tick);
        self.retire(id, TaskState::Interrupted, ctx.tick);
        self.emit(SchedulerEvent::TaskInterrupted {
            id,
            by,
            tick: ctx.tick,
        });
        Ok(())
    }

    /// Marks `id` done, releases everything it holds, and discards it unless it is a
    /// default task.
    fn retire(&mut self, id: TaskId, state: TaskState, tick: u64) {
        let Some(entry) = self.tasks.get_mut(id) else {
            return;
        };
        entry.state = state;
        let held = std::mem::take(&mut entry.held);
        let keep = entry.default_for.is_some();
        for resource in held {
            self.release(resource, id, tick);
        }
        self.running.retain(|running| *running != id);
        if !keep {
            self.tasks.remove(id);
        }
    }

    fn release(&mut self, resource: ResourceId, owner: TaskId, tick: u64) {
        if let Some(res) = self.resources.get_mut(resource) {
            if res.holder == Some(owner) {
                res.holder = None;
                trace!("Resource '{}' released", res.name);
                self.emit(SchedulerEvent::ResourceReleased { resource, tick });
            }
        }
    }

    fn check_resources(&self, requirements: &ResourceSet) -> Result<()> {
        match requirements
            .iter()
            .find(|r| !self.resources.contains_key(**r))
        {
            Some(unknown) => Err(TaskflowError::UnknownResource(*unknown)),
            None => Ok(()),
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        self.event_sender.send(event).ok();
    }
}

// Public API implementation block.
impl Scheduler {
    /// Adds an exclusive resource.
    pub fn add_resource(&mut self, name: impl Into<String>) -> ResourceId {
        let name = name.into();
        debug!("Resource '{}' added", name);
        self.resources.insert(Resource {
            name,
            holder: None,
            default_task: None,
        })
    }

    /// Queues a task for admission on the next tick.
    ///
    /// Registering a shared task instance that is already pending or running does
    /// nothing and returns the id it already has.
    ///
    /// # Errors
    /// `UnknownResource` if the task requires a resource this scheduler never created.
    pub fn register(&mut self, task: impl Task + 'static) -> Result<TaskId> {
        let requirements = task.requirements();
        self.check_resources(&requirements)?;

        if let Some(key) = task.instance_key() {
            let existing = self.tasks.iter().find(|(_, e)| {
                matches!(e.state, TaskState::Pending | TaskState::Running)
                    && e.default_for.is_none()
                    && e.task.instance_key() == Some(key)
            });
            if let Some((id, entry)) = existing {
                trace!("Task '{}' is already scheduled", entry.name);
                return Ok(id);
            }
        }

        let name = task.name();
        let id = self.tasks.insert(TaskEntry {
            task: Box::new(task),
            name: name.clone(),
            state: TaskState::Pending,
            held: ResourceSet::new(),
            default_for: None,
        });
        self.pending.push_back(id);
        debug!("Task '{}' registered", name);
        self.emit(SchedulerEvent::TaskRegistered { id, name });
        Ok(id)
    }

    /// Makes `task` the default for `resource`, replacing (and interrupting, if it is
    /// running) any previous default. The default starts on the first tick that ends
    /// with the resource idle.
    ///
    /// # Errors
    /// `UnknownResource` for a resource this scheduler never created, and
    /// `DefaultMissingRequirement` if the task does not require `resource`.
    pub fn set_default(
        &mut self,
        resource: ResourceId,
        task: impl Task + 'static,
    ) -> Result<TaskId> {
        let resource_name = self
            .resource_name(resource)
            .ok_or(TaskflowError::UnknownResource(resource))?
            .to_string();
        let requirements = task.requirements();
        if !requirements.contains(&resource) {
            return Err(TaskflowError::DefaultMissingRequirement {
                task: task.name(),
                resource: resource_name,
            });
        }
        self.check_resources(&requirements)?;
        self.clear_default(resource)?;

        let name = task.name();
        let id = self.tasks.insert(TaskEntry {
            task: Box::new(task),
            name: name.clone(),
            state: TaskState::Pending,
            held: ResourceSet::new(),
            default_for: Some(resource),
        });
        if let Some(res) = self.resources.get_mut(resource) {
            res.default_task = Some(id);
        }
        debug!("Task '{}' is now the default for '{}'", name, resource_name);
        self.emit(SchedulerEvent::DefaultChanged {
            resource,
            id: Some(id),
        });
        Ok(id)
    }

    /// Removes the default task of `resource`, interrupting it if it is running.
    pub fn clear_default(&mut self, resource: ResourceId) -> Result<()> {
        let res = self
            .resources
            .get_mut(resource)
            .ok_or(TaskflowError::UnknownResource(resource))?;
        let Some(old) = res.default_task.take() else {
            return Ok(());
        };
        if self.is_running(old) {
            let ctx = self.context(Duration::ZERO);
            self.interrupt(old, &ctx, None)?;
        }
        self.tasks.remove(old);
        self.emit(SchedulerEvent::DefaultChanged { resource, id: None });
        Ok(())
    }

    /// Interrupts a running task or drops a pending one. Returns `false` if the task
    /// was neither.
    pub fn cancel(&mut self, id: TaskId) -> Result<bool> {
        let state = self.state(id).ok_or(TaskflowError::UnknownTask(id))?;
        match state {
            TaskState::Running => {
                let ctx = self.context(Duration::ZERO);
                self.interrupt(id, &ctx, None)?;
                Ok(true)
            }
            TaskState::Pending if self.pending.contains(&id) => {
                self.pending.retain(|p| *p != id);
                self.tasks.remove(id);
                debug!("Pending task {:?} cancelled", id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Interrupts every running task and drops every pending one.
    ///
    /// Resources and their defaults stay configured, so defaults resume on the next tick.
    pub fn remove_all(&mut self) -> Result<()> {
        let ctx = self.context(Duration::ZERO);
        for id in self.running.clone() {
            self.interrupt(id, &ctx, None)?;
        }
        for id in std::mem::take(&mut self.pending) {
            self.tasks.remove(id);
        }
        debug!("Scheduler cleared");
        self.emit(SchedulerEvent::Cleared);
        Ok(())
    }

    /// `true` if `id` names a task that is currently running.
    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks
            .get(id)
            .is_some_and(|e| e.state == TaskState::Running)
    }

    /// The lifecycle state of a live task. Finished and interrupted tasks are discarded,
    /// so only default tasks ever report those states.
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(|e| e.state)
    }

    /// The name a live task was registered under.
    pub fn task_name(&self, id: TaskId) -> Option<&str> {
        self.tasks.get(id).map(|e| e.name.as_str())
    }

    /// The task currently holding `resource`.
    pub fn holder(&self, resource: ResourceId) -> Option<TaskId> {
        self.resources.get(resource).and_then(|r| r.holder)
    }

    /// The default task configured for `resource`, running or not.
    pub fn default_task(&self, resource: ResourceId) -> Option<TaskId> {
        self.resources.get(resource).and_then(|r| r.default_task)
    }

    /// The name `resource` was added with.
    pub fn resource_name(&self, resource: ResourceId) -> Option<&str> {
        self.resources.get(resource).map(|r| r.name.as_str())
    }

    /// Looks a resource up by the name it was added with.
    pub fn resource_by_name(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| id)
    }

    /// All resources, in the order they were added.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &str)> + '_ {
        self.resources.iter().map(|(id, r)| (id, r.name.as_str()))
    }

    /// Running tasks in the order they were admitted.
    pub fn running(&self) -> &[TaskId] {
        &self.running
    }

    /// Tasks registered but not yet admitted.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of ticks processed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Sum of all deltas passed to `tick`.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Subscribes to the `SchedulerEvent` stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_sender.subscribe()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;
    use crate::components::quick::{InstantTask, ReleaseTask};
    use crate::components::wait::WaitUntilTask;
    use crate::testing::{Journal, Probe};
    use crate::time::ManualClock;
    use tokio::sync::broadcast::error::TryRecvError;

    const DT: Duration = Duration::from_millis(20);

    fn drain(rx: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        events
    }

    #[test]
    fn test_release_kills_running_and_starts_default() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let subsystem = scheduler.add_resource("subsystem");
        let default = scheduler
            .set_default(subsystem, Probe::new("default", &journal).requiring(subsystem))
            .unwrap();
        let running = scheduler
            .register(Probe::new("running", &journal).requiring(subsystem))
            .unwrap();

        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(running));
        assert!(!scheduler.is_running(default));

        let release = scheduler.register(ReleaseTask::new(subsystem)).unwrap();
        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(release));
        assert!(!scheduler.is_running(running));
        assert!(!scheduler.is_running(default));

        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(default));
        assert!(!scheduler.is_running(release));
        assert!(!scheduler.is_running(running));
        assert_eq!(scheduler.holder(subsystem), Some(default));
        assert!(journal.contains("running:interrupted"));
    }

    #[test]
    fn test_holder_ends_before_newcomer_starts() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        scheduler
            .register(Probe::new("old", &journal).requiring(arm))
            .unwrap();
        scheduler.tick(DT).unwrap();
        scheduler
            .register(Probe::new("new", &journal).requiring(arm))
            .unwrap();
        scheduler.tick(DT).unwrap();

        assert_eq!(
            journal.entries(),
            ["old:start", "old:step", "old:interrupted", "new:start"]
        );
    }

    #[test]
    fn test_default_starts_on_first_idle_tick() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let default = scheduler
            .set_default(arm, Probe::new("hold", &journal).requiring(arm))
            .unwrap();
        assert_eq!(scheduler.state(default), Some(TaskState::Pending));
        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(default));
    }

    #[test]
    fn test_finished_default_restarts_fresh() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let default = scheduler
            .set_default(arm, Probe::new("home", &journal).requiring(arm).finish_after(1))
            .unwrap();
        scheduler.tick(DT).unwrap();
        scheduler.tick(DT).unwrap();
        // Finished during advance, idle again, restarted in the same tick.
        assert!(scheduler.is_running(default));
        assert_eq!(
            journal.entries(),
            ["home:start", "home:step", "home:end", "home:start"]
        );
    }

    #[test]
    fn test_unknown_resource_is_rejected_at_registration() {
        let mut other = Scheduler::new();
        let foreign = other.add_resource("elsewhere");
        let mut scheduler = Scheduler::new();
        let err = scheduler.register(ReleaseTask::new(foreign)).unwrap_err();
        assert!(matches!(err, TaskflowError::UnknownResource(r) if r == foreign));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_default_must_require_its_resource() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let err = scheduler
            .set_default(arm, Probe::new("idle", &journal))
            .unwrap_err();
        assert!(matches!(err, TaskflowError::DefaultMissingRequirement { .. }));
        assert_eq!(scheduler.default_task(arm), None);
    }

    #[test]
    fn test_uninterruptible_holder_rejects_newcomer() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let hold = scheduler
            .register(Probe::new("hold", &journal).requiring(arm).uninterruptible())
            .unwrap();
        scheduler.tick(DT).unwrap();

        let mut events = scheduler.subscribe_events();
        let newcomer = scheduler
            .register(Probe::new("newcomer", &journal).requiring(arm))
            .unwrap();
        scheduler.tick(DT).unwrap();

        assert!(scheduler.is_running(hold));
        assert_eq!(scheduler.state(newcomer), None);
        assert!(!journal.contains("hold:interrupted"));
        assert!(!journal.contains("newcomer:start"));
        assert!(drain(&mut events).contains(&SchedulerEvent::TaskRejected {
            id: newcomer,
            blocked_by: hold,
        }));
    }

    #[test]
    fn test_remove_all_interrupts_and_default_resumes() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let default = scheduler
            .set_default(arm, Probe::new("default", &journal).requiring(arm))
            .unwrap();
        let busy = scheduler
            .register(Probe::new("busy", &journal).requiring(arm))
            .unwrap();
        scheduler.tick(DT).unwrap();
        let queued = scheduler.register(InstantTask::noop()).unwrap();

        scheduler.remove_all().unwrap();
        assert!(!scheduler.is_running(busy));
        assert_eq!(scheduler.state(queued), None);
        assert!(journal.contains("busy:interrupted"));
        assert_eq!(scheduler.holder(arm), None);

        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(default));
    }

    #[test]
    fn test_task_error_aborts_tick() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        scheduler
            .register(Probe::new("bad", &journal).failing())
            .unwrap();
        scheduler.tick(DT).unwrap();
        let err = scheduler.tick(DT).unwrap_err();
        assert!(matches!(err, TaskflowError::TaskFailed(_)));
        let message = format!("{:#}", err);
        assert!(message.contains("task 'bad' failed during step"));
        assert!(message.contains("bad failed"));
    }

    #[test]
    fn test_group_releases_resources_as_children_finish() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let drive = scheduler.add_resource("drive");
        let arm = scheduler.add_resource("arm");
        let default = scheduler
            .set_default(drive, Probe::new("drive-default", &journal).requiring(drive))
            .unwrap();

        let mut builder = TaskBuilder::named("auto");
        builder
            .sequential(Probe::new("drive", &journal).requiring(drive).finish_after(1))
            .sequential(Probe::new("arm", &journal).requiring(arm));
        let group = scheduler.register(builder.build()).unwrap();

        scheduler.tick(DT).unwrap();
        assert_eq!(scheduler.holder(drive), Some(group));
        assert_eq!(scheduler.holder(arm), Some(group));
        assert!(!scheduler.is_running(default));

        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(group));
        assert_eq!(scheduler.holder(arm), Some(group));
        assert_eq!(scheduler.holder(drive), Some(default));
        assert!(scheduler.is_running(default));
    }

    #[test]
    fn test_same_shared_instance_is_scheduled_once() {
        let mut builder = TaskBuilder::new();
        builder.wait_for_duration(Duration::from_secs(1));
        let mut scheduler = Scheduler::new();
        let first = scheduler.register(builder.build()).unwrap();
        let second = scheduler.register(builder.build()).unwrap();
        assert_eq!(first, second);
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.tick(DT).unwrap();
        assert_eq!(scheduler.register(builder.build()).unwrap(), first);
        assert_eq!(scheduler.running(), &[first]);
    }

    #[test]
    fn test_shared_instance_can_run_again_after_finishing() {
        let mut builder = TaskBuilder::new();
        builder.sequential(InstantTask::noop());
        let mut scheduler = Scheduler::new();
        let first = scheduler.register(builder.build()).unwrap();
        scheduler.tick(DT).unwrap();
        scheduler.tick(DT).unwrap();
        assert_eq!(scheduler.state(first), None);

        let second = scheduler.register(builder.build()).unwrap();
        assert_ne!(first, second);
        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(second));
    }

    #[test]
    fn test_cancel_running_and_pending() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let running = scheduler.register(Probe::new("a", &journal)).unwrap();
        scheduler.tick(DT).unwrap();
        let pending = scheduler.register(Probe::new("b", &journal)).unwrap();

        assert!(scheduler.cancel(running).unwrap());
        assert!(scheduler.cancel(pending).unwrap());
        assert!(matches!(
            scheduler.cancel(running),
            Err(TaskflowError::UnknownTask(_))
        ));
        scheduler.tick(DT).unwrap();
        assert_eq!(journal.entries(), ["a:start", "a:interrupted"]);
    }

    #[test]
    fn test_replacing_a_running_default_interrupts_it() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let old = scheduler
            .set_default(arm, Probe::new("old", &journal).requiring(arm))
            .unwrap();
        scheduler.tick(DT).unwrap();
        let new = scheduler
            .set_default(arm, Probe::new("new", &journal).requiring(arm))
            .unwrap();
        assert_eq!(scheduler.state(old), None);
        assert!(journal.contains("old:interrupted"));

        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(new));
    }

    #[test]
    fn test_match_clock_is_sampled_each_tick() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new().with_match_clock(clock.clone());
        let wait = scheduler
            .register(WaitUntilTask::new(Duration::from_secs(15)))
            .unwrap();
        scheduler.tick(DT).unwrap();
        clock.set(Duration::from_secs(14));
        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(wait));
        clock.set(Duration::from_secs(15));
        scheduler.tick(DT).unwrap();
        assert!(!scheduler.is_running(wait));
    }

    #[test]
    fn test_events_follow_lifecycle() {
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let mut events = scheduler.subscribe_events();
        let release = scheduler.register(ReleaseTask::new(arm)).unwrap();
        scheduler.tick(DT).unwrap();
        scheduler.tick(DT).unwrap();

        let lifecycle: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| !matches!(e, SchedulerEvent::TickCompleted { .. }))
            .collect();
        assert_eq!(
            lifecycle,
            [
                SchedulerEvent::TaskRegistered {
                    id: release,
                    name: "ReleaseTask".to_string(),
                },
                SchedulerEvent::TaskStarted { id: release, tick: 1 },
                SchedulerEvent::ResourceReleased { resource: arm, tick: 2 },
                SchedulerEvent::TaskFinished { id: release, tick: 2 },
            ]
        );
    }

    #[test]
    fn test_with_config_creates_resources() {
        let config = TaskflowConfig::from_toml_str(
            r#"
            [[resources]]
            name = "drivetrain"
            "#,
        )
        .unwrap();
        let scheduler = Scheduler::with_config(&config);
        let drivetrain = scheduler.resource_by_name("drivetrain").unwrap();
        assert_eq!(scheduler.resource_name(drivetrain), Some("drivetrain"));
        assert_eq!(scheduler.resources().count(), 1);
    }

    #[test]
    fn test_running_group_claims_resources_of_appended_children() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let hold = scheduler
            .register(Probe::new("hold", &journal).requiring(arm))
            .unwrap();
        let mut builder = TaskBuilder::named("routine");
        builder.wait_for_duration(Duration::from_millis(40));
        let routine = scheduler.register(builder.build()).unwrap();
        scheduler.tick(DT).unwrap();
        assert_eq!(scheduler.holder(arm), Some(hold));

        builder.sequential(Probe::new("late", &journal).requiring(arm));
        for _ in 0..3 {
            scheduler.tick(DT).unwrap();
        }

        assert!(!scheduler.is_running(hold));
        assert!(scheduler.is_running(routine));
        assert_eq!(scheduler.holder(arm), Some(routine));
        assert_eq!(
            journal.entries(),
            ["hold:start", "hold:step", "hold:interrupted", "late:start", "late:step"]
        );
    }

    #[test]
    fn test_running_group_yields_to_uninterruptible_holder() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let hold = scheduler
            .register(Probe::new("hold", &journal).requiring(arm).uninterruptible())
            .unwrap();
        let mut builder = TaskBuilder::named("routine");
        builder.wait_for_duration(Duration::from_millis(40));
        let routine = scheduler.register(builder.build()).unwrap();
        scheduler.tick(DT).unwrap();

        let mut events = scheduler.subscribe_events();
        builder.sequential(Probe::new("late", &journal).requiring(arm));
        for _ in 0..3 {
            scheduler.tick(DT).unwrap();
        }

        assert!(scheduler.is_running(hold));
        assert_eq!(scheduler.state(routine), None);
        assert_eq!(scheduler.holder(arm), Some(hold));
        assert!(!journal.contains("late:start"));
        assert!(drain(&mut events).contains(&SchedulerEvent::TaskInterrupted {
            id: routine,
            by: Some(hold),
            tick: 2,
        }));
    }

    #[test]
    fn test_failed_takeover_does_not_strand_newcomer() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        scheduler
            .register(Probe::new("stuck", &journal).requiring(arm).failing_end())
            .unwrap();
        scheduler.tick(DT).unwrap();

        let mut builder = TaskBuilder::named("routine");
        builder.sequential(Probe::new("next", &journal).requiring(arm));
        let first = scheduler.register(builder.build()).unwrap();
        let err = scheduler.tick(DT).unwrap_err();
        assert!(format!("{:#}", err).contains("stuck failed to end"));
        assert_eq!(scheduler.state(first), None);
        assert_eq!(scheduler.pending_count(), 0);

        let second = scheduler.register(builder.build()).unwrap();
        assert_ne!(first, second);
        assert_eq!(scheduler.state(second), Some(TaskState::Pending));
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_blocked_default_waits_without_rejections() {
        let journal = Journal::default();
        let mut scheduler = Scheduler::new();
        let arm = scheduler.add_resource("arm");
        let wrist = scheduler.add_resource("wrist");
        let clamp = scheduler
            .register(Probe::new("clamp", &journal).requiring(wrist).uninterruptible())
            .unwrap();
        let stow = scheduler
            .set_default(
                arm,
                Probe::new("stow", &journal).requiring(arm).requiring(wrist),
            )
            .unwrap();

        let mut events = scheduler.subscribe_events();
        for _ in 0..3 {
            scheduler.tick(DT).unwrap();
        }
        assert!(!scheduler.is_running(stow));
        assert!(!drain(&mut events)
            .iter()
            .any(|e| matches!(e, SchedulerEvent::TaskRejected { .. })));

        assert!(scheduler.cancel(clamp).unwrap());
        scheduler.tick(DT).unwrap();
        assert!(scheduler.is_running(stow));
        assert_eq!(scheduler.holder(wrist), Some(stow));
    }
}
