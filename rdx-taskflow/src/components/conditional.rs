//! A task that picks one of two branches when it starts and becomes that branch.

use super::condition::Condition;
use super::task::Task;
use crate::common::ResourceSet;
use crate::time::TickContext;
use anyhow::Result;
use tracing::trace;

/// Which branch, if any, a [`ConditionalTask`] is delegating to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    NotStarted,
    RunningTrue,
    RunningFalse,
    Finished,
}

/// Evaluates its condition exactly once per run, at `start`, then delegates every
/// later call to the chosen child. The other child is never started, even if the
/// condition would answer differently later on.
pub struct ConditionalTask {
    condition: Condition,
    on_true: Box<dyn Task>,
    on_false: Box<dyn Task>,
    branch: Branch,
}

impl ConditionalTask {
    pub fn new(
        condition: Condition,
        on_true: impl Task + 'static,
        on_false: impl Task + 'static,
    ) -> Self {
        Self {
            condition,
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
            branch: Branch::NotStarted,
        }
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    fn chosen(&mut self) -> Option<&mut Box<dyn Task>> {
        match self.branch {
            Branch::RunningTrue => Some(&mut self.on_true),
            Branch::RunningFalse => Some(&mut self.on_false),
            Branch::NotStarted | Branch::Finished => None,
        }
    }
}

impl Task for ConditionalTask {
    fn name(&self) -> String {
        format!("if({} | {})", self.on_true.name(), self.on_false.name())
    }

    fn requirements(&self) -> ResourceSet {
        match self.branch {
            Branch::RunningTrue => self.on_true.requirements(),
            Branch::RunningFalse => self.on_false.requirements(),
            Branch::NotStarted | Branch::Finished => {
                let mut all = self.on_true.requirements();
                all.extend(self.on_false.requirements());
                all
            }
        }
    }

    fn start(&mut self, ctx: &TickContext) -> Result<()> {
        let value = self.condition.evaluate()?;
        self.branch = if value {
            Branch::RunningTrue
        } else {
            Branch::RunningFalse
        };
        trace!("Conditional chose {:?}", self.branch);
        match self.chosen() {
            Some(child) => child.start(ctx),
            None => Ok(()),
        }
    }

    fn step(&mut self, ctx: &TickContext) -> Result<()> {
        match self.chosen() {
            Some(child) => child.step(ctx),
            None => Ok(()),
        }
    }

    fn is_finished(&mut self, ctx: &TickContext) -> Result<bool> {
        match self.chosen() {
            Some(child) => child.is_finished(ctx),
            None => Ok(true),
        }
    }

    fn end(&mut self, ctx: &TickContext, interrupted: bool) -> Result<()> {
        let result = match self.chosen() {
            Some(child) => child.end(ctx, interrupted),
            None => Ok(()),
        };
        self.branch = Branch::Finished;
        result
    }

    fn interruptible(&self) -> bool {
        match self.branch {
            Branch::RunningTrue => self.on_true.interruptible(),
            Branch::RunningFalse => self.on_false.interruptible(),
            Branch::NotStarted | Branch::Finished => true,
        }
    }
}
