//! The sequential/parallel combinator.
//!
//! A `CompositeTask` owns an ordered list of children. Sequential children form a
//! chain: each one starts only after the previous one is done, either by finishing or
//! by running out its timeout. A parallel child starts as soon as the chain reaches
//! its position and then runs alongside whatever comes after it. The composite is
//! finished when the chain is exhausted and every parallel child has finished too.

use super::task::Task;
use crate::common::ResourceSet;
use crate::time::TickContext;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::trace;

/// How a child relates to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Pending,
    Active { started_at: Duration },
    Done,
}

struct Entry {
    task: Box<dyn Task>,
    mode: ExecutionMode,
    timeout: Option<Duration>,
    status: EntryStatus,
}

impl Entry {
    fn is_active(&self) -> bool {
        matches!(self.status, EntryStatus::Active { .. })
    }

    fn timed_out(&self, ctx: &TickContext) -> bool {
        match (self.status, self.timeout) {
            (EntryStatus::Active { started_at }, Some(timeout)) => {
                ctx.elapsed.saturating_sub(started_at) >= timeout
            }
            _ => false,
        }
    }

    /// One tick for an active child. Returns `true` once the child is done.
    fn advance(&mut self, ctx: &TickContext) -> Result<bool> {
        if self.timed_out(ctx) {
            trace!("Child '{}' timed out", self.task.name());
            self.task.end(ctx, true)?;
            self.status = EntryStatus::Done;
            return Ok(true);
        }
        self.task.step(ctx)?;
        if self.task.is_finished(ctx)? {
            trace!("Child '{}' finished", self.task.name());
            self.task.end(ctx, false)?;
            self.status = EntryStatus::Done;
            return Ok(true);
        }
        Ok(false)
    }
}

/// A task made of ordered sequential and parallel children.
pub struct CompositeTask {
    name: String,
    entries: Vec<Entry>,
    cursor: usize,
    running: bool,
}

impl CompositeTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            cursor: 0,
            running: false,
        }
    }

    /// Appends a child to the tail of the chain.
    ///
    /// With a timeout, the child is interrupted once that much scheduler time has
    /// passed since it started, and the chain moves on.
    pub fn add_sequential(
        &mut self,
        task: impl Task + 'static,
        timeout: Option<Duration>,
    ) -> &mut Self {
        self.push(Box::new(task), ExecutionMode::Sequential, timeout)
    }

    /// Attaches a child at the current chain position. It starts when the chain gets
    /// here and runs concurrently with the rest of the chain.
    pub fn add_parallel(&mut self, task: impl Task + 'static, timeout: Option<Duration>) -> &mut Self {
        self.push(Box::new(task), ExecutionMode::Parallel, timeout)
    }

    fn push(
        &mut self,
        task: Box<dyn Task>,
        mode: ExecutionMode,
        timeout: Option<Duration>,
    ) -> &mut Self {
        self.entries.push(Entry {
            task,
            mode,
            timeout,
            status: EntryStatus::Pending,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of children currently started and not yet done.
    pub fn active_children(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active()).count()
    }

    /// Starts the child at `index`, first interrupting any other active child that
    /// needs one of the same resources.
    fn activate(&mut self, index: usize, ctx: &TickContext) -> Result<()> {
        let claimed = self.entries[index].task.requirements();
        if !claimed.is_empty() {
            for (i, other) in self.entries.iter_mut().enumerate() {
                if i != index
                    && other.is_active()
                    && !other.task.requirements().is_disjoint(&claimed)
                {
                    trace!(
                        "'{}' interrupting child '{}' over a shared resource",
                        self.name,
                        other.task.name()
                    );
                    other.task.end(ctx, true)?;
                    other.status = EntryStatus::Done;
                }
            }
        }
        let entry = &mut self.entries[index];
        trace!("'{}' starting child #{} '{}'", self.name, index, entry.task.name());
        entry.task.start(ctx)?;
        entry.status = EntryStatus::Active {
            started_at: ctx.elapsed,
        };
        Ok(())
    }
}

impl Task for CompositeTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// Before it starts (and after it ends) a composite needs everything any child
    /// needs. While running it only needs what its unfinished children need.
    fn requirements(&self) -> ResourceSet {
        self.entries
            .iter()
            .filter(|e| !self.running || e.status != EntryStatus::Done)
            .flat_map(|e| e.task.requirements())
            .collect()
    }

    fn start(&mut self, _ctx: &TickContext) -> Result<()> {
        for entry in &mut self.entries {
            entry.status = EntryStatus::Pending;
        }
        self.cursor = 0;
        self.running = true;
        Ok(())
    }

    fn step(&mut self, ctx: &TickContext) -> Result<()> {
        while self.cursor < self.entries.len() {
            let index = self.cursor;
            let (mode, status) = {
                let entry = &self.entries[index];
                (entry.mode, entry.status)
            };
            match (mode, status) {
                (ExecutionMode::Parallel, EntryStatus::Pending) => {
                    self.activate(index, ctx)?;
                    self.cursor += 1;
                }
                (_, EntryStatus::Done) | (ExecutionMode::Parallel, EntryStatus::Active { .. }) => {
                    self.cursor += 1;
                }
                (ExecutionMode::Sequential, _) => {
                    if status == EntryStatus::Pending {
                        self.activate(index, ctx)?;
                    }
                    let done = self.entries[index]
                        .advance(ctx)
                        .with_context(|| format!("in group '{}'", self.name))?;
                    if !done {
                        break;
                    }
                    self.cursor += 1;
                }
            }
        }

        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.mode == ExecutionMode::Parallel && e.is_active())
        {
            entry
                .advance(ctx)
                .with_context(|| format!("in group '{}'", self.name))?;
        }
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &TickContext) -> Result<bool> {
        Ok(self.cursor >= self.entries.len() && !self.entries.iter().any(Entry::is_active))
    }

    fn end(&mut self, ctx: &TickContext, _interrupted: bool) -> Result<()> {
        for entry in self.entries.iter_mut().filter(|e| e.is_active()) {
            entry.task.end(ctx, true)?;
            entry.status = EntryStatus::Done;
        }
        self.running = false;
        Ok(())
    }

    fn interruptible(&self) -> bool {
        self.entries
            .iter()
            .filter(|e| e.is_active())
            .all(|e| e.task.interruptible())
    }
}
